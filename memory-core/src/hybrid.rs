//! Hybrid retrieval: entity extraction, multi-channel search, and
//! reciprocal-rank-fusion over the results.

use std::collections::HashMap;

use regex::Regex;
use uuid::Uuid;

use crate::constants::defaults;
use crate::types::MemorySector;

/// A candidate result surfaced by one retrieval channel.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: Uuid,
    pub content: String,
    pub memory_sector: MemorySector,
    pub memory_strength: f32,
    pub project_id: String,
}

/// One channel's ranked result list, weighted for fusion.
#[derive(Debug, Clone)]
pub struct ChannelResults {
    pub weight: f64,
    /// Candidates in descending rank order (best first).
    pub ranked: Vec<Candidate>,
}

/// Keyword-ish proper-noun / quoted-phrase entity extraction from a query,
/// used to decide whether a query is "relational" (about named entities and
/// their connections) versus a general semantic lookup.
#[must_use]
pub fn extract_entities(query: &str) -> Vec<String> {
    // Capitalized words/phrases and quoted spans, the two coarse entity
    // signals cheap enough to run on every query without an NER model.
    let quoted = Regex::new(r#""([^"]+)""#).expect("static pattern is valid");
    let capitalized = Regex::new(r"\b[A-Z][a-zA-Z0-9]+\b").expect("static pattern is valid");

    let mut entities: Vec<String> = quoted
        .captures_iter(query)
        .map(|c| c[1].to_string())
        .collect();
    entities.extend(capitalized.find_iter(query).map(|m| m.as_str().to_string()));
    entities.sort();
    entities.dedup();
    entities
}

/// Relational-query heuristic: two or more extracted entities, or a
/// relation-style keyword ("between", "connects", "related to").
#[must_use]
pub fn is_relational_query(query: &str, entities: &[String]) -> bool {
    if entities.len() >= 2 {
        return true;
    }
    let lowered = query.to_lowercase();
    ["between", "connects", "related to", "relationship"]
        .iter()
        .any(|kw| lowered.contains(kw))
}

/// Channel weights to use for a query, depending on whether it is judged
/// relational.
#[must_use]
pub fn channel_weights(is_relational: bool) -> (f64, f64, f64) {
    if is_relational {
        (
            defaults::RELATIONAL_SEMANTIC_WEIGHT,
            defaults::RELATIONAL_KEYWORD_WEIGHT,
            defaults::RELATIONAL_GRAPH_WEIGHT,
        )
    } else {
        (
            defaults::DEFAULT_SEMANTIC_WEIGHT,
            defaults::DEFAULT_KEYWORD_WEIGHT,
            defaults::DEFAULT_GRAPH_WEIGHT,
        )
    }
}

/// Filter candidates down to the requested memory sectors. An empty
/// `sectors` list is the "no filter" case per the short-circuit rule, not
/// "match nothing".
#[must_use]
pub fn apply_sector_filter(candidates: Vec<Candidate>, sectors: &[MemorySector]) -> Vec<Candidate> {
    if sectors.is_empty() {
        return candidates;
    }
    candidates
        .into_iter()
        .filter(|c| sectors.contains(&c.memory_sector))
        .collect()
}

/// Fused result: an id with both its raw RRF score and the final score with
/// the `memory_strength` multiplier applied, so callers can report both for
/// transparency.
#[derive(Debug, Clone)]
pub struct FusedResult {
    pub id: Uuid,
    /// `sum_i(w_i / (k + rank_i))`, before the `memory_strength` multiplier.
    pub rrf_score: f64,
    /// `rrf_score * memory_strength`.
    pub score: f64,
}

/// Reciprocal-rank-fusion across an arbitrary number of weighted channels.
///
/// `score(doc) = sum_i(w_i / (k + rank_i(doc)))`, with rank 1-indexed, then
/// each document's fused score is multiplied by its `memory_strength`
/// (defaulting to 1.0 for documents that only appear in channels lacking a
/// strength signal — callers pass candidates already carrying it).
#[must_use]
pub fn reciprocal_rank_fusion(channels: &[ChannelResults], k: f64) -> Vec<FusedResult> {
    let mut scores: HashMap<Uuid, f64> = HashMap::new();
    let mut strengths: HashMap<Uuid, f32> = HashMap::new();

    for channel in channels {
        for (idx, candidate) in channel.ranked.iter().enumerate() {
            let rank = (idx + 1) as f64;
            *scores.entry(candidate.id).or_insert(0.0) += channel.weight / (k + rank);
            strengths
                .entry(candidate.id)
                .or_insert(candidate.memory_strength);
        }
    }

    let mut fused: Vec<FusedResult> = scores
        .into_iter()
        .map(|(id, rrf_score)| {
            let strength = f64::from(*strengths.get(&id).unwrap_or(&1.0));
            FusedResult {
                id,
                rrf_score,
                score: rrf_score * strength,
            }
        })
        .collect();

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: Uuid, strength: f32) -> Candidate {
        Candidate {
            id,
            content: "c".into(),
            memory_sector: MemorySector::Semantic,
            memory_strength: strength,
            project_id: "p".into(),
        }
    }

    #[test]
    fn extract_entities_picks_up_quoted_and_capitalized_terms() {
        let entities = extract_entities(r#"How does "Project Atlas" relate to Ada?"#);
        assert!(entities.contains(&"Project Atlas".to_string()));
        assert!(entities.contains(&"Ada".to_string()));
    }

    #[test]
    fn two_entities_trigger_relational_routing() {
        let entities = extract_entities("How is Ada connected to Babbage?");
        assert!(is_relational_query("How is Ada connected to Babbage?", &entities));
    }

    #[test]
    fn sector_filter_is_a_noop_when_empty() {
        let candidates = vec![candidate(Uuid::new_v4(), 1.0)];
        let filtered = apply_sector_filter(candidates.clone(), &[]);
        assert_eq!(filtered.len(), candidates.len());
    }

    #[test]
    fn sector_filter_excludes_non_matching_sectors() {
        let mut c = candidate(Uuid::new_v4(), 1.0);
        c.memory_sector = MemorySector::Emotional;
        let filtered = apply_sector_filter(vec![c], &[MemorySector::Semantic]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn rrf_worked_example() {
        // Two channels, one shared document ranked 1st and 2nd respectively.
        let shared = Uuid::new_v4();
        let only_in_a = Uuid::new_v4();

        let channel_a = ChannelResults {
            weight: 0.6,
            ranked: vec![candidate(shared, 1.0), candidate(only_in_a, 1.0)],
        };
        let channel_b = ChannelResults {
            weight: 0.4,
            ranked: vec![candidate(shared, 1.0)],
        };

        let fused = reciprocal_rank_fusion(&[channel_a, channel_b], 60.0);
        let shared_score = fused.iter().find(|r| r.id == shared).unwrap().score;
        let expected = 0.6 / 61.0 + 0.4 / 61.0;
        assert!((shared_score - expected).abs() < 1e-9);
        // The shared document should outrank the one appearing in a single channel.
        assert_eq!(fused[0].id, shared);
    }

    #[test]
    fn rrf_applies_memory_strength_multiplier() {
        let id = Uuid::new_v4();
        let channel = ChannelResults {
            weight: 1.0,
            ranked: vec![candidate(id, 0.5)],
        };
        let fused = reciprocal_rank_fusion(&[channel], 60.0);
        let expected = (1.0 / 61.0) * 0.5;
        assert!((fused[0].score - expected).abs() < 1e-9);
    }
}
