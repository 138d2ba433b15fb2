//! Multi-tenant request context and project-scoped access control.

use crate::error::{Error, Result};
use crate::types::{AccessLevel, ProjectRegistryEntry, ReadPermission};

/// The project a request is scoped to, threaded through to the storage
/// boundary on every call so row filtering happens by explicit predicate
/// rather than an ambient session variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub project_id: String,
}

impl RequestContext {
    #[must_use]
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
        }
    }
}

/// Outcome of a cross-project read check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadDecision {
    /// Same project; always allowed.
    SameProject,
    /// Different project, explicit grant found; allowed but shadow-audited.
    GrantedCrossProject,
    /// `Super` access level; allowed but shadow-audited.
    SuperAccess,
    /// No grant and no super access; denied.
    Denied,
}

impl ReadDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Self::Denied)
    }

    #[must_use]
    pub fn requires_shadow_audit(&self) -> bool {
        matches!(self, Self::GrantedCrossProject | Self::SuperAccess)
    }
}

/// Decide whether `reader` may read rows belonging to `target`, given the
/// reader's registry entry and any explicit grants on record.
#[must_use]
pub fn check_read_access(
    reader: &ProjectRegistryEntry,
    target_project: &str,
    grants: &[ReadPermission],
) -> ReadDecision {
    if reader.project_id == target_project {
        return ReadDecision::SameProject;
    }
    if reader.access_level == AccessLevel::Super {
        return ReadDecision::SuperAccess;
    }
    let granted = grants
        .iter()
        .any(|g| g.reader_project == reader.project_id && g.target_project == target_project);
    if granted {
        ReadDecision::GrantedCrossProject
    } else {
        ReadDecision::Denied
    }
}

/// Enforce [`check_read_access`], returning an error on denial.
///
/// # Errors
///
/// Returns [`Error::Validation`] if access is denied.
pub fn require_read_access(
    reader: &ProjectRegistryEntry,
    target_project: &str,
    grants: &[ReadPermission],
) -> Result<ReadDecision> {
    let decision = check_read_access(reader, target_project, grants);
    if decision.is_allowed() {
        Ok(decision)
    } else {
        Err(Error::validation(
            "project_id",
            format!("project '{}' has no read access to '{target_project}'", reader.project_id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(project_id: &str, access_level: AccessLevel) -> ProjectRegistryEntry {
        ProjectRegistryEntry {
            project_id: project_id.to_string(),
            display_name: project_id.to_string(),
            access_level,
        }
    }

    #[test]
    fn same_project_is_always_allowed() {
        let reader = entry("alpha", AccessLevel::Isolated);
        let decision = check_read_access(&reader, "alpha", &[]);
        assert_eq!(decision, ReadDecision::SameProject);
        assert!(!decision.requires_shadow_audit());
    }

    #[test]
    fn isolated_without_grant_is_denied() {
        let reader = entry("alpha", AccessLevel::Isolated);
        let decision = check_read_access(&reader, "beta", &[]);
        assert_eq!(decision, ReadDecision::Denied);
    }

    #[test]
    fn explicit_grant_allows_and_requires_shadow_audit() {
        let reader = entry("alpha", AccessLevel::Isolated);
        let grants = vec![ReadPermission {
            reader_project: "alpha".into(),
            target_project: "beta".into(),
        }];
        let decision = check_read_access(&reader, "beta", &grants);
        assert_eq!(decision, ReadDecision::GrantedCrossProject);
        assert!(decision.requires_shadow_audit());
    }

    #[test]
    fn super_access_allows_any_project_with_shadow_audit() {
        let reader = entry("alpha", AccessLevel::Super);
        let decision = check_read_access(&reader, "beta", &[]);
        assert_eq!(decision, ReadDecision::SuperAccess);
        assert!(decision.requires_shadow_audit());
    }

    #[test]
    fn require_read_access_errors_on_denial() {
        let reader = entry("alpha", AccessLevel::Isolated);
        let err = require_read_access(&reader, "beta", &[]).unwrap_err();
        assert_eq!(err.category(), "validation");
    }
}
