#![allow(clippy::expect_used)]

//! # Memory Storage - Turso
//!
//! Turso/libSQL durable storage backend for the cognitive memory service's
//! typed property graph and tiered-memory record types.
//!
//! This crate provides:
//! - Connection management for Turso/libsql databases
//! - SQL schema creation and migration
//! - [`memory_core::storage`] trait implementations scoped by project id
//! - Retry logic via the shared circuit breaker for transient failures
//!
//! ## Example
//!
//! ```no_run
//! use memory_storage_turso::TursoStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = TursoStore::new("libsql://localhost:8080", "token").await?;
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

mod convert;
mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use libsql::{params, Builder, Connection, Database};
use memory_core::error::{Error, Result};
use memory_core::storage::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use memory_core::storage::{AuditStore, EpisodeStore, GraphStore, InsightStore};
use memory_core::types::{AuditLogEntry, Edge, Episode, Insight, Node};
use tracing::{debug, warn};
use uuid::Uuid;

use convert::{edge_from_row, insight_from_row, node_from_row};

/// Turso/libsql-backed durable storage for the cognitive memory service.
pub struct TursoStore {
    db: Arc<Database>,
    breaker: CircuitBreaker,
}

impl TursoStore {
    /// Open a connection to `url`.
    ///
    /// # Security
    ///
    /// Only `libsql://` (with a non-empty `token`), `file:`, and `:memory:`
    /// are accepted; `http://`/`https://` are rejected so a misconfigured
    /// URL can't silently downgrade to an unauthenticated connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the URL's protocol is rejected or
    /// the underlying connection fails to open.
    pub async fn new(url: &str, token: &str) -> Result<Self> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Err(Error::Configuration(
                "refusing http(s):// database URL; use libsql://, file:, or :memory:".to_string(),
            ));
        }
        if url.starts_with("libsql://") && token.is_empty() {
            return Err(Error::Configuration(
                "libsql:// connections require a non-empty auth token".to_string(),
            ));
        }

        let db = if url == ":memory:" || url.starts_with("file:") {
            Builder::new_local(url.trim_start_matches("file:"))
                .build()
                .await
                .map_err(|e| Error::Configuration(format!("failed to open local database: {e}")))?
        } else {
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| Error::Configuration(format!("failed to connect to turso: {e}")))?
        };

        Ok(Self {
            db: Arc::new(db),
            breaker: CircuitBreaker::new(CircuitBreakerConfig::default()),
        })
    }

    fn connection(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| Error::Database(format!("failed to open connection: {e}")))
    }

    /// Create all tables and indexes if they don't already exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] if a statement fails to execute.
    pub async fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;
        for statement in schema::all_statements() {
            conn.execute(statement, ())
                .await
                .map_err(|e| Error::Database(format!("migration failed: {e}")))?;
        }
        debug!("schema migration complete");
        Ok(())
    }

    async fn retrying<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.breaker.call(op).await
    }
}

#[async_trait]
impl GraphStore for TursoStore {
    async fn find_node(&self, project_id: &str, name: &str) -> Result<Option<Node>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT id, project_id, label, name, properties, vector_id, created_at \
                     FROM nodes WHERE project_id = ?1 AND name = ?2",
                    params![project_id, name],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            match rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                Some(row) => Ok(Some(node_from_row(&row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put_node(&self, node: Node) -> Result<()> {
        let conn = self.connection()?;
        let properties = serde_json::to_string(&node.properties)?;
        self.retrying(|| async {
            conn.execute(
                "INSERT INTO nodes (id, project_id, label, name, properties, vector_id, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
                 ON CONFLICT(project_id, name) DO UPDATE SET label=excluded.label, properties=excluded.properties, vector_id=excluded.vector_id",
                params![
                    node.id.to_string(),
                    node.project_id.clone(),
                    node.label.clone(),
                    node.name.clone(),
                    properties.clone(),
                    node.vector_id,
                    node.created_at.timestamp()
                ],
            )
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn find_edge(
        &self,
        project_id: &str,
        source_id: Uuid,
        target_id: Uuid,
        relation: &str,
    ) -> Result<Option<Edge>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT id, project_id, source_id, target_id, relation, weight, properties, \
                     memory_sector, access_count, last_accessed, modified_at \
                     FROM edges WHERE project_id = ?1 AND source_id = ?2 AND target_id = ?3 AND relation = ?4",
                    params![
                        project_id,
                        source_id.to_string(),
                        target_id.to_string(),
                        relation
                    ],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            match rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                Some(row) => Ok(Some(edge_from_row(&row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn find_edge_by_id(&self, project_id: &str, edge_id: Uuid) -> Result<Option<Edge>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT id, project_id, source_id, target_id, relation, weight, properties, \
                     memory_sector, access_count, last_accessed, modified_at \
                     FROM edges WHERE project_id = ?1 AND id = ?2",
                    params![project_id, edge_id.to_string()],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            match rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                Some(row) => Ok(Some(edge_from_row(&row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put_edge(&self, edge: Edge) -> Result<()> {
        let conn = self.connection()?;
        let properties = serde_json::to_string(&edge.properties)?;
        self.retrying(|| async {
            conn.execute(
                "INSERT INTO edges (id, project_id, source_id, target_id, relation, weight, properties, \
                 memory_sector, access_count, last_accessed, modified_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11) \
                 ON CONFLICT(project_id, source_id, target_id, relation) DO UPDATE SET \
                 weight=excluded.weight, properties=excluded.properties, memory_sector=excluded.memory_sector, \
                 access_count=excluded.access_count, last_accessed=excluded.last_accessed, modified_at=excluded.modified_at",
                params![
                    edge.id.to_string(),
                    edge.project_id.clone(),
                    edge.source_id.to_string(),
                    edge.target_id.to_string(),
                    edge.relation.clone(),
                    f64::from(edge.weight),
                    properties.clone(),
                    edge.memory_sector.to_string(),
                    edge.access_count as i64,
                    edge.last_accessed.map(|t| t.timestamp()),
                    edge.modified_at.timestamp()
                ],
            )
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn outgoing_edges(&self, project_id: &str, node_id: Uuid) -> Result<Vec<(Edge, Node)>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT e.id, e.project_id, e.source_id, e.target_id, e.relation, e.weight, e.properties, \
                     e.memory_sector, e.access_count, e.last_accessed, e.modified_at, \
                     n.id, n.project_id, n.label, n.name, n.properties, n.vector_id, n.created_at \
                     FROM edges e JOIN nodes n ON n.id = e.target_id \
                     WHERE e.project_id = ?1 AND e.source_id = ?2",
                    params![project_id, node_id.to_string()],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

            let mut results = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                let edge = edge_from_row(&row)?;
                let node = convert::node_from_row_at(&row, 11)?;
                results.push((edge, node));
            }
            Ok(results)
        })
        .await
    }

    async fn incoming_edges(&self, project_id: &str, node_id: Uuid) -> Result<Vec<(Edge, Node)>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT e.id, e.project_id, e.source_id, e.target_id, e.relation, e.weight, e.properties, \
                     e.memory_sector, e.access_count, e.last_accessed, e.modified_at, \
                     n.id, n.project_id, n.label, n.name, n.properties, n.vector_id, n.created_at \
                     FROM edges e JOIN nodes n ON n.id = e.source_id \
                     WHERE e.project_id = ?1 AND e.target_id = ?2",
                    params![project_id, node_id.to_string()],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;

            let mut results = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                let edge = edge_from_row(&row)?;
                let node = convert::node_from_row_at(&row, 11)?;
                results.push((edge, node));
            }
            Ok(results)
        })
        .await
    }

    async fn delete_edge(&self, project_id: &str, edge_id: Uuid) -> Result<()> {
        let conn = self.connection()?;
        self.retrying(|| async {
            conn.execute(
                "DELETE FROM edges WHERE project_id = ?1 AND id = ?2",
                params![project_id, edge_id.to_string()],
            )
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl InsightStore for TursoStore {
    async fn insert(&self, insight: Insight) -> Result<i64> {
        let conn = self.connection()?;
        let embedding = bincode_floats(&insight.embedding);
        let source_ids = serde_json::to_string(&insight.source_ids)?;
        let tags = serde_json::to_string(&insight.tags)?;
        let metadata = insight.metadata.to_string();
        self.retrying(|| async {
            conn.execute(
                "INSERT INTO insights (project_id, content, embedding, source_ids, memory_strength, metadata, tags) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    insight.project_id.clone(),
                    insight.content.clone(),
                    embedding.clone(),
                    source_ids.clone(),
                    f64::from(insight.memory_strength),
                    metadata.clone(),
                    tags.clone()
                ],
            )
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn list(&self, project_id: &str, limit: usize) -> Result<Vec<Insight>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT id, project_id, content, embedding, source_ids, memory_strength, metadata, tags, created_at \
                     FROM insights WHERE project_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                    params![project_id, limit as i64],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            let mut results = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                results.push(insight_from_row(&row)?);
            }
            Ok(results)
        })
        .await
    }
}

#[async_trait]
impl EpisodeStore for TursoStore {
    async fn insert(&self, episode: Episode) -> Result<i64> {
        let conn = self.connection()?;
        let embedding = bincode_floats(&episode.query_embedding);
        let tags = serde_json::to_string(&episode.tags)?;
        let metadata = episode.metadata.to_string();
        self.retrying(|| async {
            conn.execute(
                "INSERT INTO episodes (project_id, query, reward, reflection, query_embedding, tags, metadata) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    episode.project_id.clone(),
                    episode.query.clone(),
                    f64::from(episode.reward),
                    episode.reflection.clone(),
                    embedding.clone(),
                    tags.clone(),
                    metadata.clone()
                ],
            )
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn list(&self, project_id: &str, limit: usize) -> Result<Vec<Episode>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT id, project_id, query, reward, reflection, query_embedding, tags, metadata, created_at \
                     FROM episodes WHERE project_id = ?1 ORDER BY created_at DESC LIMIT ?2",
                    params![project_id, limit as i64],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            let mut results = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                results.push(convert::episode_from_row(&row)?);
            }
            Ok(results)
        })
        .await
    }
}

#[async_trait]
impl AuditStore for TursoStore {
    async fn append(&self, entry: AuditLogEntry) -> Result<()> {
        let conn = self.connection()?;
        let preserved = serde_json::to_string(&entry.preserved_properties)?;
        self.retrying(|| async {
            conn.execute(
                "INSERT INTO audit_log (id, project_id, edge_id, action, blocked, reason, actor, preserved_properties, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    entry.id.to_string(),
                    entry.project_id.clone(),
                    entry.edge_id.to_string(),
                    format!("{:?}", entry.action),
                    i64::from(entry.blocked),
                    entry.reason.clone(),
                    entry.actor.clone(),
                    preserved.clone(),
                    entry.timestamp.timestamp()
                ],
            )
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn recent(&self, project_id: &str, limit: usize) -> Result<Vec<AuditLogEntry>> {
        let conn = self.connection()?;
        self.retrying(|| async {
            let mut rows = conn
                .query(
                    "SELECT id, edge_id, action, blocked, reason, actor, preserved_properties, timestamp \
                     FROM audit_log WHERE project_id = ?1 ORDER BY timestamp DESC LIMIT ?2",
                    params![project_id, limit as i64],
                )
                .await
                .map_err(|e| Error::Database(e.to_string()))?;
            let mut results = Vec::new();
            while let Some(row) = rows.next().await.map_err(|e| Error::Database(e.to_string()))? {
                let mut entry = convert::audit_entry_from_row(&row)?;
                entry.project_id = project_id.to_string();
                results.push(entry);
            }
            Ok(results)
        })
        .await
    }
}

fn bincode_floats(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_http_database_urls() {
        let err = TursoStore::new("http://example.com", "token").await.unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[tokio::test]
    async fn rejects_remote_url_without_token() {
        let err = TursoStore::new("libsql://example.turso.io", "").await.unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[tokio::test]
    async fn in_memory_database_migrates_successfully() {
        let store = TursoStore::new(":memory:", "").await.expect("in-memory db should open");
        store.migrate().await.expect("migration should succeed");
    }

    #[tokio::test]
    async fn node_upsert_round_trips() {
        let store = TursoStore::new(":memory:", "").await.unwrap();
        store.migrate().await.unwrap();

        let node = memory_core::types::Node {
            id: Uuid::new_v4(),
            project_id: "p".into(),
            label: "Person".into(),
            name: "Ada".into(),
            properties: memory_core::types::Properties::new(),
            vector_id: None,
            created_at: chrono::Utc::now(),
        };
        store.put_node(node.clone()).await.unwrap();
        let found = store.find_node("p", "Ada").await.unwrap().expect("node should exist");
        assert_eq!(found.id, node.id);
    }
}
