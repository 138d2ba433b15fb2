//! First-match-wins memory-sector classification for edges.

use crate::types::{MemorySector, Properties};

const PROCEDURAL_RELATIONS: &[&str] = &["LEARNED", "CAN_DO"];
const REFLECTIVE_RELATIONS: &[&str] = &["REFLECTS", "REFLECTS_ON", "REALIZED"];

/// Classify an edge's memory sector from its properties and relation name.
///
/// Rules are evaluated in order and the first match wins:
/// 1. `emotional_valence` present → `Emotional`
/// 2. `context_type == "shared_experience"` → `Episodic`
/// 3. `relation` in `{LEARNED, CAN_DO}` → `Procedural`
/// 4. `relation` in `{REFLECTS, REFLECTS_ON, REALIZED}` → `Reflective`
/// 5. otherwise → `Semantic`
#[must_use]
pub fn classify_sector(properties: &Properties, relation: &str) -> MemorySector {
    if properties.emotional_valence().is_some() {
        return MemorySector::Emotional;
    }
    if properties.context_type() == Some("shared_experience") {
        return MemorySector::Episodic;
    }
    if PROCEDURAL_RELATIONS.contains(&relation) {
        return MemorySector::Procedural;
    }
    if REFLECTIVE_RELATIONS.contains(&relation) {
        return MemorySector::Reflective;
    }
    MemorySector::Semantic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyValue;

    #[test]
    fn emotional_valence_wins_over_everything_else() {
        let mut props = Properties::new();
        props.insert("emotional_valence", PropertyValue::String("joy".into()));
        props.insert(
            "context_type",
            PropertyValue::String("shared_experience".into()),
        );
        assert_eq!(classify_sector(&props, "LEARNED"), MemorySector::Emotional);
    }

    #[test]
    fn shared_experience_is_episodic() {
        let mut props = Properties::new();
        props.insert(
            "context_type",
            PropertyValue::String("shared_experience".into()),
        );
        assert_eq!(classify_sector(&props, "ANY"), MemorySector::Episodic);
    }

    #[test]
    fn learned_and_can_do_are_procedural() {
        let props = Properties::new();
        assert_eq!(classify_sector(&props, "LEARNED"), MemorySector::Procedural);
        assert_eq!(classify_sector(&props, "CAN_DO"), MemorySector::Procedural);
    }

    #[test]
    fn reflects_family_is_reflective() {
        let props = Properties::new();
        assert_eq!(classify_sector(&props, "REFLECTS"), MemorySector::Reflective);
        assert_eq!(
            classify_sector(&props, "REFLECTS_ON"),
            MemorySector::Reflective
        );
        assert_eq!(classify_sector(&props, "REALIZED"), MemorySector::Reflective);
    }

    #[test]
    fn default_is_semantic() {
        let props = Properties::new();
        assert_eq!(classify_sector(&props, "KNOWS"), MemorySector::Semantic);
    }
}
