//! Shared test fixtures for the cognitive memory workspace.

use chrono::Utc;
use memory_core::types::{Edge, MemorySector, Node, Properties, PropertyValue};
use uuid::Uuid;

/// Build a minimal node in project `"test-project"`.
#[must_use]
pub fn sample_node(name: &str) -> Node {
    Node {
        id: Uuid::new_v4(),
        project_id: "test-project".to_string(),
        label: "Person".to_string(),
        name: name.to_string(),
        properties: Properties::new(),
        vector_id: None,
        created_at: Utc::now(),
    }
}

/// Build a minimal descriptive (non-constitutive) edge between two nodes.
#[must_use]
pub fn sample_edge(source_id: Uuid, target_id: Uuid, relation: &str) -> Edge {
    Edge {
        id: Uuid::new_v4(),
        project_id: "test-project".to_string(),
        source_id,
        target_id,
        relation: relation.to_string(),
        weight: 1.0,
        properties: Properties::new(),
        memory_sector: MemorySector::Semantic,
        access_count: 0,
        last_accessed: None,
        modified_at: Utc::now(),
    }
}

/// Build a constitutive edge (`edge_type = "constitutive"`).
#[must_use]
pub fn constitutive_edge(source_id: Uuid, target_id: Uuid, relation: &str) -> Edge {
    let mut edge = sample_edge(source_id, target_id, relation);
    edge.properties
        .insert("edge_type", PropertyValue::String("constitutive".to_string()));
    edge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constitutive_edge_is_marked_constitutive() {
        let edge = constitutive_edge(Uuid::new_v4(), Uuid::new_v4(), "LOVES");
        assert!(edge.is_constitutive());
    }
}
