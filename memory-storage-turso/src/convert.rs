//! Row-to-domain-type conversions shared by the [`crate::TursoStore`] trait
//! implementations.

use chrono::{DateTime, Utc};
use libsql::{Row, Value};
use memory_core::error::{Error, Result};
use memory_core::types::{
    AuditAction, AuditLogEntry, Edge, Episode, Insight, MemorySector, Node, Properties,
};
use uuid::Uuid;

fn text(row: &Row, idx: i32) -> Result<String> {
    match row.get_value(idx).map_err(|e| Error::Database(e.to_string()))? {
        Value::Text(s) => Ok(s),
        other => Err(Error::Database(format!("expected TEXT column at {idx}, got {other:?}"))),
    }
}

fn opt_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx).map_err(|e| Error::Database(e.to_string()))? {
        Value::Null => Ok(None),
        Value::Text(s) => Ok(Some(s)),
        other => Err(Error::Database(format!("expected TEXT/NULL column at {idx}, got {other:?}"))),
    }
}

fn integer(row: &Row, idx: i32) -> Result<i64> {
    match row.get_value(idx).map_err(|e| Error::Database(e.to_string()))? {
        Value::Integer(n) => Ok(n),
        other => Err(Error::Database(format!("expected INTEGER column at {idx}, got {other:?}"))),
    }
}

fn opt_integer(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx).map_err(|e| Error::Database(e.to_string()))? {
        Value::Null => Ok(None),
        Value::Integer(n) => Ok(Some(n)),
        other => Err(Error::Database(format!("expected INTEGER/NULL column at {idx}, got {other:?}"))),
    }
}

fn real(row: &Row, idx: i32) -> Result<f64> {
    match row.get_value(idx).map_err(|e| Error::Database(e.to_string()))? {
        Value::Real(n) => Ok(n),
        Value::Integer(n) => Ok(n as f64),
        other => Err(Error::Database(format!("expected REAL column at {idx}, got {other:?}"))),
    }
}

fn blob(row: &Row, idx: i32) -> Result<Vec<u8>> {
    match row.get_value(idx).map_err(|e| Error::Database(e.to_string()))? {
        Value::Blob(b) => Ok(b),
        other => Err(Error::Database(format!("expected BLOB column at {idx}, got {other:?}"))),
    }
}

fn timestamp(row: &Row, idx: i32) -> Result<DateTime<Utc>> {
    let secs = integer(row, idx)?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| Error::Database(format!("invalid timestamp at column {idx}: {secs}")))
}

fn opt_timestamp(row: &Row, idx: i32) -> Result<Option<DateTime<Utc>>> {
    match opt_integer(row, idx)? {
        Some(secs) => Ok(Some(
            DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| Error::Database(format!("invalid timestamp at column {idx}: {secs}")))?,
        )),
        None => Ok(None),
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| Error::Database(format!("invalid uuid {raw}: {e}")))
}

fn floats_from_blob(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn parse_memory_sector(raw: &str) -> Result<MemorySector> {
    match raw {
        "emotional" => Ok(MemorySector::Emotional),
        "episodic" => Ok(MemorySector::Episodic),
        "semantic" => Ok(MemorySector::Semantic),
        "procedural" => Ok(MemorySector::Procedural),
        "reflective" => Ok(MemorySector::Reflective),
        other => Err(Error::Database(format!("unknown memory_sector: {other}"))),
    }
}

/// Columns: `id, project_id, label, name, properties, vector_id, created_at`.
pub(crate) fn node_from_row(row: &Row) -> Result<Node> {
    node_from_row_at(row, 0)
}

/// Same shape as [`node_from_row`] but starting at an arbitrary column
/// offset, for queries that join nodes alongside other tables.
pub(crate) fn node_from_row_at(row: &Row, offset: i32) -> Result<Node> {
    Ok(Node {
        id: parse_uuid(&text(row, offset)?)?,
        project_id: text(row, offset + 1)?,
        label: text(row, offset + 2)?,
        name: text(row, offset + 3)?,
        properties: serde_json::from_str::<Properties>(&text(row, offset + 4)?)?,
        vector_id: opt_integer(row, offset + 5)?,
        created_at: timestamp(row, offset + 6)?,
    })
}

/// Columns: `id, project_id, source_id, target_id, relation, weight,
/// properties, memory_sector, access_count, last_accessed, modified_at`.
pub(crate) fn edge_from_row(row: &Row) -> Result<Edge> {
    Ok(Edge {
        id: parse_uuid(&text(row, 0)?)?,
        project_id: text(row, 1)?,
        source_id: parse_uuid(&text(row, 2)?)?,
        target_id: parse_uuid(&text(row, 3)?)?,
        relation: text(row, 4)?,
        weight: real(row, 5)? as f32,
        properties: serde_json::from_str::<Properties>(&text(row, 6)?)?,
        memory_sector: parse_memory_sector(&text(row, 7)?)?,
        access_count: integer(row, 8)?.max(0) as u64,
        last_accessed: opt_timestamp(row, 9)?,
        modified_at: timestamp(row, 10)?,
    })
}

/// Columns: `id, project_id, content, embedding, source_ids,
/// memory_strength, metadata, tags, created_at`.
pub(crate) fn insight_from_row(row: &Row) -> Result<Insight> {
    Ok(Insight {
        id: integer(row, 0)?,
        project_id: text(row, 1)?,
        content: text(row, 2)?,
        embedding: floats_from_blob(&blob(row, 3)?),
        source_ids: serde_json::from_str(&text(row, 4)?)?,
        memory_strength: real(row, 5)? as f32,
        metadata: serde_json::from_str(&text(row, 6)?)?,
        tags: serde_json::from_str(&text(row, 7)?)?,
        created_at: timestamp(row, 8)?,
    })
}

/// Columns: `id, project_id, query, reward, reflection, query_embedding,
/// tags, metadata, created_at`.
pub(crate) fn episode_from_row(row: &Row) -> Result<Episode> {
    Ok(Episode {
        id: integer(row, 0)?,
        project_id: text(row, 1)?,
        query: text(row, 2)?,
        reward: real(row, 3)? as f32,
        reflection: text(row, 4)?,
        query_embedding: floats_from_blob(&blob(row, 5)?),
        tags: serde_json::from_str(&text(row, 6)?)?,
        metadata: serde_json::from_str(&text(row, 7)?)?,
        created_at: timestamp(row, 8)?,
    })
}

/// Columns: `id, edge_id, action, blocked, reason, actor,
/// preserved_properties, timestamp`. `project_id` is supplied by the
/// caller since the `recent` query already filters on it.
pub(crate) fn audit_entry_from_row(row: &Row) -> Result<AuditLogEntry> {
    let action = match text(row, 2)?.as_str() {
        "DeleteAttempt" => AuditAction::DeleteAttempt,
        "DeleteSuccess" => AuditAction::DeleteSuccess,
        other => return Err(Error::Database(format!("unknown audit action: {other}"))),
    };
    Ok(AuditLogEntry {
        id: parse_uuid(&text(row, 0)?)?,
        project_id: String::new(),
        edge_id: parse_uuid(&text(row, 1)?)?,
        action,
        blocked: integer(row, 3)? != 0,
        reason: text(row, 4)?,
        actor: text(row, 5)?,
        preserved_properties: serde_json::from_str::<Properties>(&text(row, 6)?)?,
        timestamp: timestamp(row, 7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_round_trip_through_le_bytes() {
        let values = vec![1.0_f32, -2.5, 0.0, 3.25];
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        assert_eq!(floats_from_blob(&bytes), values);
    }

    #[test]
    fn parses_known_memory_sectors() {
        assert_eq!(parse_memory_sector("semantic").unwrap(), MemorySector::Semantic);
        assert!(parse_memory_sector("bogus").is_err());
    }
}
