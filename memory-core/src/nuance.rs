//! Dissonance arbitration: tracking and resolving pending nuance reviews.

use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{NuanceReview, NuanceStatus};

/// How a dissonance review was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// `edge_a` is kept, `edge_b` is superseded.
    KeepA,
    /// `edge_b` is kept, `edge_a` is superseded.
    KeepB,
    /// Both are kept; the conflict was judged apparent rather than real.
    KeepBoth,
}

/// In-memory registry of pending and resolved nuance reviews.
///
/// The storage adapter is the durable source of truth; this type holds the
/// decision logic so it can be unit-tested without a database.
#[derive(Debug, Default)]
pub struct NuanceRegistry {
    reviews: HashMap<Uuid, NuanceReview>,
}

impl NuanceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new pending review over a pair of conflicting edges.
    pub fn open_review(&mut self, edge_a: Uuid, edge_b: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.reviews.insert(
            id,
            NuanceReview {
                id,
                status: NuanceStatus::PendingReview,
                edge_a,
                edge_b,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Edge ids currently subject to a pending nuance review; the IEF
    /// penalty applies to any edge present in this set.
    #[must_use]
    pub fn get_pending_nuance_edge_ids(&self) -> Vec<Uuid> {
        self.reviews
            .values()
            .filter(|r| r.status == NuanceStatus::PendingReview)
            .flat_map(|r| [r.edge_a, r.edge_b])
            .collect()
    }

    /// Resolve a pending review. Returns the id of the superseded edge, if
    /// the resolution named one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `review_id` does not exist, and
    /// [`Error::Validation`] if it has already been resolved.
    pub fn resolve_dissonance(
        &mut self,
        review_id: Uuid,
        resolution: Resolution,
    ) -> Result<Option<Uuid>> {
        let review = self
            .reviews
            .get_mut(&review_id)
            .ok_or_else(|| Error::NotFound(format!("nuance review {review_id}")))?;

        if review.status == NuanceStatus::Resolved {
            return Err(Error::validation(
                "review_id",
                "review has already been resolved",
            ));
        }

        let superseded = match resolution {
            Resolution::KeepA => Some(review.edge_b),
            Resolution::KeepB => Some(review.edge_a),
            Resolution::KeepBoth => None,
        };
        review.status = NuanceStatus::Resolved;
        Ok(superseded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_ids_include_both_edges_of_an_open_review() {
        let mut registry = NuanceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.open_review(a, b);
        let pending = registry.get_pending_nuance_edge_ids();
        assert!(pending.contains(&a));
        assert!(pending.contains(&b));
    }

    #[test]
    fn resolving_removes_edges_from_pending_set() {
        let mut registry = NuanceRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let review_id = registry.open_review(a, b);
        let superseded = registry
            .resolve_dissonance(review_id, Resolution::KeepA)
            .expect("resolve should succeed");
        assert_eq!(superseded, Some(b));
        assert!(registry.get_pending_nuance_edge_ids().is_empty());
    }

    #[test]
    fn resolving_twice_is_an_error() {
        let mut registry = NuanceRegistry::new();
        let review_id = registry.open_review(Uuid::new_v4(), Uuid::new_v4());
        registry
            .resolve_dissonance(review_id, Resolution::KeepBoth)
            .unwrap();
        let err = registry
            .resolve_dissonance(review_id, Resolution::KeepBoth)
            .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn resolving_unknown_review_is_not_found() {
        let mut registry = NuanceRegistry::new();
        let err = registry
            .resolve_dissonance(Uuid::new_v4(), Resolution::KeepBoth)
            .unwrap_err();
        assert_eq!(err.category(), "not_found");
    }
}
