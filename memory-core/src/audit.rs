//! Constitutive-edge deletion guard and its append-only audit trail.

use chrono::Utc;
use uuid::Uuid;

use crate::constants::logging::LOG_PREFIX_AUDIT;
use crate::error::{Error, Result};
use crate::graph::{guard_delete, DeleteDecision};
use crate::types::{AuditAction, AuditLogEntry, Edge};

/// Who attempted the action, recorded verbatim in the audit entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// A human or MCP-client-issued request.
    Io,
    /// An internal maintenance or migration process.
    System,
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Io => "I/O",
            Self::System => "system",
        };
        write!(f, "{s}")
    }
}

/// Attempt to delete `edge`, enforcing the constitutive-edge guard and
/// building the audit entry that must be persisted regardless of outcome.
///
/// The returned entry always carries `preserved_properties` captured from
/// the edge at the moment of the attempt, since an audit row must survive
/// the edge itself being deleted (no foreign-key cascade).
///
/// # Errors
///
/// Returns [`Error::ConstitutiveProtection`] if the edge is constitutive
/// and `consent` is `false`. The caller should still persist the returned
/// blocked audit entry even on this error path.
pub fn attempt_delete(edge: &Edge, consent: bool, actor: Actor) -> (AuditLogEntry, Result<()>) {
    let decision = guard_delete(edge, consent);
    let blocked = decision == DeleteDecision::Blocked;

    let entry = AuditLogEntry {
        id: Uuid::new_v4(),
        project_id: edge.project_id.clone(),
        edge_id: edge.id,
        action: if blocked {
            AuditAction::DeleteAttempt
        } else {
            AuditAction::DeleteSuccess
        },
        blocked,
        reason: if blocked {
            format!(
                "{LOG_PREFIX_AUDIT} constitutive edge '{}' requires bilateral consent",
                edge.relation
            )
        } else {
            format!("{LOG_PREFIX_AUDIT} edge '{}' deleted", edge.relation)
        },
        actor: actor.to_string(),
        preserved_properties: edge.properties.clone(),
        timestamp: Utc::now(),
    };

    let result = if blocked {
        Err(Error::ConstitutiveProtection {
            edge_id: edge.id,
            relation: edge.relation.clone(),
        })
    } else {
        Ok(())
    };

    (entry, result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemorySector, Properties, PropertyValue};

    fn constitutive_edge() -> Edge {
        let mut props = Properties::new();
        props.insert("edge_type", PropertyValue::String("constitutive".into()));
        Edge {
            id: Uuid::new_v4(),
            project_id: "p".into(),
            source_id: Uuid::new_v4(),
            target_id: Uuid::new_v4(),
            relation: "LOVES".into(),
            weight: 1.0,
            properties: props,
            memory_sector: MemorySector::Emotional,
            access_count: 0,
            last_accessed: None,
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn blocked_deletion_returns_error_and_blocked_audit_entry() {
        let edge = constitutive_edge();
        let (entry, result) = attempt_delete(&edge, false, Actor::Io);
        assert!(result.is_err());
        assert!(entry.blocked);
        assert_eq!(entry.action, AuditAction::DeleteAttempt);
        assert_eq!(entry.actor, "I/O");
        // The entry preserves the edge's properties independent of the edge row.
        assert!(entry.preserved_properties.is_constitutive());
    }

    #[test]
    fn consented_deletion_succeeds_and_is_not_blocked() {
        let edge = constitutive_edge();
        let (entry, result) = attempt_delete(&edge, true, Actor::System);
        assert!(result.is_ok());
        assert!(!entry.blocked);
        assert_eq!(entry.action, AuditAction::DeleteSuccess);
        assert_eq!(entry.actor, "system");
    }

    #[test]
    fn descriptive_edge_never_blocked() {
        let mut edge = constitutive_edge();
        edge.properties = Properties::new();
        let (entry, result) = attempt_delete(&edge, false, Actor::Io);
        assert!(result.is_ok());
        assert!(!entry.blocked);
    }
}
