//! Database schema definitions for the Turso (libsql) durable backend.

use memory_core::constants::db;

/// SQL to create the `nodes` table.
pub const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    label TEXT NOT NULL,
    name TEXT NOT NULL,
    properties TEXT NOT NULL,
    vector_id INTEGER,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(project_id, name)
)
"#;

/// SQL to create the `edges` table.
pub const CREATE_EDGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    relation TEXT NOT NULL,
    weight REAL NOT NULL,
    properties TEXT NOT NULL,
    memory_sector TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed INTEGER,
    modified_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now')),
    UNIQUE(project_id, source_id, target_id, relation)
)
"#;

/// SQL to create the `insights` table (L2 compressed fragments).
pub const CREATE_INSIGHTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS insights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    source_ids TEXT NOT NULL,
    memory_strength REAL NOT NULL,
    metadata TEXT NOT NULL,
    tags TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

/// SQL to create the `episodes` table.
pub const CREATE_EPISODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS episodes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL,
    query TEXT NOT NULL,
    reward REAL NOT NULL,
    reflection TEXT NOT NULL,
    query_embedding BLOB NOT NULL,
    tags TEXT NOT NULL,
    metadata TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

/// SQL to create the `raw_dialogue` table (L0 append-only log).
pub const CREATE_RAW_DIALOGUE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS raw_dialogue (
    id TEXT PRIMARY KEY NOT NULL,
    session_id TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    speaker TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL
)
"#;

/// SQL to create the `audit_log` table. Rows are append-only and never
/// cascade-deleted when the referenced edge is removed.
pub const CREATE_AUDIT_LOG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS audit_log (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    edge_id TEXT NOT NULL,
    action TEXT NOT NULL,
    blocked INTEGER NOT NULL,
    reason TEXT NOT NULL,
    actor TEXT NOT NULL,
    preserved_properties TEXT NOT NULL,
    timestamp INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

/// SQL to create the `nuance_reviews` table.
pub const CREATE_NUANCE_REVIEWS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nuance_reviews (
    id TEXT PRIMARY KEY NOT NULL,
    project_id TEXT NOT NULL,
    status TEXT NOT NULL,
    edge_a TEXT NOT NULL,
    edge_b TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
)
"#;

/// SQL to create the `project_registry` table.
pub const CREATE_PROJECT_REGISTRY_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS project_registry (
    project_id TEXT PRIMARY KEY NOT NULL,
    display_name TEXT NOT NULL,
    access_level TEXT NOT NULL
)
"#;

/// SQL to create the `read_permissions` table.
pub const CREATE_READ_PERMISSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS read_permissions (
    reader_project TEXT NOT NULL,
    target_project TEXT NOT NULL,
    PRIMARY KEY (reader_project, target_project)
)
"#;

/// Index supporting outgoing-edge traversal scoped to a project.
pub const CREATE_EDGES_SOURCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_edges_project_source
ON edges(project_id, source_id)
"#;

/// All `CREATE TABLE`/`CREATE INDEX` statements, in dependency order.
#[must_use]
pub fn all_statements() -> Vec<&'static str> {
    vec![
        CREATE_NODES_TABLE,
        CREATE_EDGES_TABLE,
        CREATE_INSIGHTS_TABLE,
        CREATE_EPISODES_TABLE,
        CREATE_RAW_DIALOGUE_TABLE,
        CREATE_AUDIT_LOG_TABLE,
        CREATE_NUANCE_REVIEWS_TABLE,
        CREATE_PROJECT_REGISTRY_TABLE,
        CREATE_READ_PERMISSIONS_TABLE,
        CREATE_EDGES_SOURCE_INDEX,
    ]
}

/// Sanity check that the compiled-in table name constants match the SQL
/// above, so a rename in one place is caught here rather than at runtime.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_reference_the_expected_table_names() {
        assert!(CREATE_NODES_TABLE.contains(db::TABLE_NODES));
        assert!(CREATE_EDGES_TABLE.contains(db::TABLE_EDGES));
        assert!(CREATE_INSIGHTS_TABLE.contains(db::TABLE_INSIGHTS));
        assert!(CREATE_EPISODES_TABLE.contains(db::TABLE_EPISODES));
        assert!(CREATE_RAW_DIALOGUE_TABLE.contains(db::TABLE_RAW_DIALOGUE));
        assert!(CREATE_AUDIT_LOG_TABLE.contains(db::TABLE_AUDIT_LOG));
        assert!(CREATE_NUANCE_REVIEWS_TABLE.contains(db::TABLE_NUANCE_REVIEWS));
        assert!(CREATE_PROJECT_REGISTRY_TABLE.contains(db::TABLE_PROJECT_REGISTRY));
        assert!(CREATE_READ_PERMISSIONS_TABLE.contains(db::TABLE_READ_PERMISSIONS));
    }

    #[test]
    fn all_statements_is_non_empty() {
        assert_eq!(all_statements().len(), 10);
    }
}
