//! Ebbinghaus-curve relevance decay, recency boost, cosine similarity, and
//! the Integrative Evaluation Function (IEF) that fuses them.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::constants::defaults;
use crate::types::{Edge, Importance};

/// Memory strength `S` used as the decay constant, per access-count and
/// importance floor.
#[must_use]
pub fn relevance_strength(access_count: u64, importance: Option<Importance>) -> f64 {
    let base =
        defaults::RELEVANCE_STRENGTH_BASE * (1.0 + ((1 + access_count) as f64).ln());
    match importance {
        Some(Importance::High) => base.max(defaults::RELEVANCE_STRENGTH_FLOOR_HIGH),
        Some(Importance::Medium) => base.max(defaults::RELEVANCE_STRENGTH_FLOOR_MEDIUM),
        Some(Importance::Low) | None => base,
    }
}

/// Exponential relevance decay clamped to `[0, 1]`. Constitutive edges
/// never decay: callers should short-circuit to `1.0` before calling this
/// for a constitutive edge, but this function is also correct on its own
/// since a `days_since_last_accessed` of `0` yields `1.0`.
#[must_use]
pub fn relevance_score(days_since_last_accessed: f64, strength: f64) -> f64 {
    if strength <= 0.0 {
        return 0.0;
    }
    (-days_since_last_accessed / strength).exp().clamp(0.0, 1.0)
}

/// Relevance for an edge, accounting for the constitutive-edge exemption
/// from decay.
#[must_use]
pub fn edge_relevance(edge: &Edge, now: DateTime<Utc>) -> f64 {
    if edge.is_constitutive() {
        return 1.0;
    }
    let days_since = edge
        .last_accessed
        .map_or(0.0, |last| (now - last).num_seconds() as f64 / 86_400.0);
    let strength = relevance_strength(edge.access_count, edge.properties.importance());
    relevance_score(days_since.max(0.0), strength)
}

/// Recency boost from days since last modification; `0.5` if unknown.
#[must_use]
pub fn recency_boost(days_since_modified: Option<f64>) -> f64 {
    days_since_modified.map_or(0.5, |days| (-days / defaults::RECENCY_DECAY_DAYS).exp())
}

/// Cosine similarity normalized into `[0, 1]`. Falls back to `0.5` on a
/// zero-norm vector, dimension mismatch, or either vector being empty.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.5;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.5;
    }
    let cos = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    (cos + 1.0) / 2.0
}

/// Inputs to the Integrative Evaluation Function for a single edge.
#[derive(Debug, Clone)]
pub struct IefInputs {
    pub relevance: f64,
    pub similarity: f64,
    pub recency: f64,
    pub is_constitutive: bool,
    pub has_pending_nuance_review: bool,
}

/// Mutable feedback state behind the IEF weighting, encapsulated rather
/// than held as module-level globals so multiple engine instances (e.g.
/// per-project) stay independent and testable.
#[derive(Debug)]
pub struct FeedbackState {
    inner: RwLock<FeedbackInner>,
}

#[derive(Debug, Clone)]
struct FeedbackInner {
    samples_since_recalibration: u64,
    relevance_weight: f64,
    similarity_weight: f64,
    recency_weight: f64,
    constitutive_weight: f64,
}

impl Default for FeedbackInner {
    fn default() -> Self {
        Self {
            samples_since_recalibration: 0,
            relevance_weight: defaults::IEF_WEIGHT_RELEVANCE,
            similarity_weight: defaults::IEF_WEIGHT_SIMILARITY,
            recency_weight: defaults::IEF_WEIGHT_RECENCY,
            constitutive_weight: defaults::IEF_WEIGHT_CONSTITUTIVE,
        }
    }
}

impl Default for FeedbackState {
    fn default() -> Self {
        Self {
            inner: RwLock::new(FeedbackInner::default()),
        }
    }
}

impl FeedbackState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one outcome sample (e.g. a user up/down vote on a retrieved
    /// result). Every [`defaults::FEEDBACK_RECALIBRATION_THRESHOLD`]
    /// samples, weights are nudged toward whichever signal best explains
    /// recent outcomes; the adjustment itself is intentionally small and
    /// bounded so total weight mass stays close to 1.0.
    pub fn record_feedback(&self, signal_relevance: f64) {
        let mut inner = self.inner.write();
        inner.samples_since_recalibration += 1;
        if inner.samples_since_recalibration >= defaults::FEEDBACK_RECALIBRATION_THRESHOLD {
            let nudge = (signal_relevance - 0.5) * 0.01;
            inner.relevance_weight = (inner.relevance_weight + nudge).clamp(0.1, 0.6);
            inner.samples_since_recalibration = 0;
        }
    }

    fn weights(&self) -> (f64, f64, f64, f64) {
        let inner = self.inner.read();
        (
            inner.relevance_weight,
            inner.similarity_weight,
            inner.recency_weight,
            inner.constitutive_weight,
        )
    }

    /// The `(relevance, similarity, recency, constitutive)` weights
    /// currently in effect, for callers that need to report them alongside
    /// an IEF score.
    #[must_use]
    pub fn current_weights(&self) -> (f64, f64, f64, f64) {
        self.weights()
    }
}

/// Compute the IEF score for one candidate edge.
#[must_use]
pub fn integrative_evaluation(feedback: &FeedbackState, inputs: &IefInputs) -> f64 {
    let (w_r, w_s, w_t, w_c) = feedback.weights();

    let constitutive_weight = if inputs.is_constitutive {
        defaults::IEF_CONSTITUTIVE_WEIGHT_FLOOR
    } else {
        defaults::IEF_DESCRIPTIVE_CONSTITUTIVE_WEIGHT
    };

    let nuance_penalty = if inputs.has_pending_nuance_review {
        defaults::IEF_NUANCE_PENALTY
    } else {
        0.0
    };

    let raw = w_r * inputs.relevance + w_s * inputs.similarity + w_t * inputs.recency
        + w_c * constitutive_weight
        - nuance_penalty;

    raw.clamp(defaults::IEF_MIN_SCORE, defaults::IEF_MAX_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relevance_score_is_one_at_zero_days() {
        assert!((relevance_score(0.0, 100.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn relevance_score_decays_with_time() {
        let fresh = relevance_score(1.0, 100.0);
        let stale = relevance_score(365.0, 100.0);
        assert!(fresh > stale);
        assert!((0.0..=1.0).contains(&stale));
    }

    #[test]
    fn relevance_strength_applies_importance_floor() {
        let low = relevance_strength(0, Some(Importance::Low));
        let high = relevance_strength(0, Some(Importance::High));
        assert!(high >= defaults::RELEVANCE_STRENGTH_FLOOR_HIGH);
        assert!(low < defaults::RELEVANCE_STRENGTH_FLOOR_HIGH);
    }

    #[test]
    fn recency_boost_defaults_to_half_when_absent() {
        assert!((recency_boost(None) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_is_one_for_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_falls_back_on_zero_norm() {
        let zero = vec![0.0, 0.0, 0.0];
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&zero, &v) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn cosine_similarity_falls_back_on_mismatched_dimensions() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&a, &b) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn ief_gives_constitutive_edges_a_weight_floor() {
        let feedback = FeedbackState::new();
        let constitutive = IefInputs {
            relevance: 0.1,
            similarity: 0.1,
            recency: 0.1,
            is_constitutive: true,
            has_pending_nuance_review: false,
        };
        let descriptive = IefInputs {
            is_constitutive: false,
            ..constitutive
        };
        let score_c = integrative_evaluation(&feedback, &constitutive);
        let score_d = integrative_evaluation(&feedback, &descriptive);
        assert!(score_c > score_d);
    }

    #[test]
    fn ief_applies_nuance_penalty() {
        let feedback = FeedbackState::new();
        let base = IefInputs {
            relevance: 0.8,
            similarity: 0.8,
            recency: 0.8,
            is_constitutive: false,
            has_pending_nuance_review: false,
        };
        let penalized = IefInputs {
            has_pending_nuance_review: true,
            ..base
        };
        let score_base = integrative_evaluation(&feedback, &base);
        let score_penalized = integrative_evaluation(&feedback, &penalized);
        assert!((score_base - score_penalized - defaults::IEF_NUANCE_PENALTY).abs() < 1e-9);
    }

    #[test]
    fn ief_worked_example_matches_spec() {
        // relevance=0.9, similarity=0.8, recency=0.7, constitutive edge.
        let feedback = FeedbackState::new();
        let inputs = IefInputs {
            relevance: 0.9,
            similarity: 0.8,
            recency: 0.7,
            is_constitutive: true,
            has_pending_nuance_review: false,
        };
        let score = integrative_evaluation(&feedback, &inputs);
        let expected = 0.30 * 0.9 + 0.25 * 0.8 + 0.20 * 0.7 + 0.25 * 1.5;
        assert!((score - expected).abs() < 1e-9);
    }
}
