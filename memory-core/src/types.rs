//! Typed data model: nodes, edges, property bags, and the tiered-memory record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A tagged value in a node or edge property bag.
///
/// The original store uses dynamic JSON property bags; this is the typed
/// equivalent, with accessors on [`Properties`] that validate well-known
/// keys on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// UTF-8 string.
    String(String),
    /// Double-precision number (integers are stored as whole `f64`s).
    Number(f64),
    /// Boolean flag.
    Bool(bool),
    /// Homogeneous or mixed list of property values.
    List(Vec<PropertyValue>),
    /// Nested string-keyed map.
    Map(HashMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Borrow as a string, if this value is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a bool, if this value is a `Bool`.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow as a list, if this value is a `List`.
    #[must_use]
    pub fn as_list(&self) -> Option<&[PropertyValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
            serde_json::Value::Null => Self::Bool(false),
        }
    }
}

/// `edge_type` well-known property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// Identity-defining, protected from deletion without consent.
    Constitutive,
    /// Ordinary fact-relation, freely deletable.
    Descriptive,
    /// Records the resolution of a prior dissonance.
    Resolution,
}

/// `importance` well-known property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    High,
    Medium,
    Low,
}

/// A string-keyed property bag shared by nodes and edges, with accessors
/// for the well-known keys named in the data model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Properties(pub HashMap<String, PropertyValue>);

impl Properties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.0.insert(key.into(), value);
    }

    /// Merge `other` into `self`, overwriting keys present in both (property-merge semantics).
    pub fn merge(&mut self, other: Properties) {
        self.0.extend(other.0);
    }

    #[must_use]
    pub fn edge_type(&self) -> Option<EdgeType> {
        match self.get("edge_type").and_then(PropertyValue::as_str)? {
            "constitutive" => Some(EdgeType::Constitutive),
            "descriptive" => Some(EdgeType::Descriptive),
            "resolution" => Some(EdgeType::Resolution),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_constitutive(&self) -> bool {
        self.edge_type() == Some(EdgeType::Constitutive)
    }

    #[must_use]
    pub fn importance(&self) -> Option<Importance> {
        match self.get("importance").and_then(PropertyValue::as_str)? {
            "high" => Some(Importance::High),
            "medium" => Some(Importance::Medium),
            "low" => Some(Importance::Low),
            _ => None,
        }
    }

    #[must_use]
    pub fn entrenchment_level(&self) -> Option<&str> {
        self.get("entrenchment_level").and_then(PropertyValue::as_str)
    }

    #[must_use]
    pub fn emotional_valence(&self) -> Option<&str> {
        self.get("emotional_valence").and_then(PropertyValue::as_str)
    }

    #[must_use]
    pub fn context_type(&self) -> Option<&str> {
        self.get("context_type").and_then(PropertyValue::as_str)
    }

    #[must_use]
    pub fn participants(&self) -> Option<Vec<&str>> {
        self.get("participants")
            .and_then(PropertyValue::as_list)
            .map(|items| items.iter().filter_map(PropertyValue::as_str).collect())
    }

    /// An edge is superseded iff its properties carry `superseded=true` or a
    /// `status` string containing "superseded" — the contract from the
    /// open question on `_is_edge_superseded`.
    #[must_use]
    pub fn is_superseded(&self) -> bool {
        if self.get("superseded").and_then(PropertyValue::as_bool) == Some(true) {
            return true;
        }
        self.get("status")
            .and_then(PropertyValue::as_str)
            .is_some_and(|s| s.contains("superseded"))
    }

    #[must_use]
    pub fn vector_id(&self) -> Option<i64> {
        match self.get("vector_id")? {
            PropertyValue::Number(n) => Some(*n as i64),
            _ => None,
        }
    }

    /// Force `entrenchment_level` to its maximal value, used when
    /// `edge_type == constitutive` regardless of caller input.
    pub fn force_maximal_entrenchment(&mut self) {
        self.insert(
            "entrenchment_level",
            PropertyValue::String("maximal".to_string()),
        );
    }
}

/// One of the five memory-sector tags assigned to edges at insert/update time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySector {
    Emotional,
    Episodic,
    Semantic,
    Procedural,
    Reflective,
}

impl std::fmt::Display for MemorySector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Emotional => "emotional",
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Reflective => "reflective",
        };
        write!(f, "{s}")
    }
}

/// Identity-stable entity in the property graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: Uuid,
    pub project_id: String,
    pub label: String,
    pub name: String,
    pub properties: Properties,
    pub vector_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Directed relationship between two nodes in the same project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub project_id: String,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relation: String,
    pub weight: f32,
    pub properties: Properties,
    pub memory_sector: MemorySector,
    pub access_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub modified_at: DateTime<Utc>,
}

impl Edge {
    #[must_use]
    pub fn is_constitutive(&self) -> bool {
        self.properties.is_constitutive()
    }
}

/// Compressed semantic fragment (`L2 insight`) consumable by hybrid search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: i64,
    pub project_id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub source_ids: Vec<String>,
    pub memory_strength: f32,
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Past query-result-reflection tuple used for analogical recall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: i64,
    pub project_id: String,
    pub query: String,
    pub reward: f32,
    pub reflection: String,
    pub query_embedding: Vec<f32>,
    pub tags: Vec<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Append-only raw dialogue log entry (L0 tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDialogueEntry {
    pub id: Uuid,
    pub session_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub speaker: String,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// A live item in the bounded working-memory buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingMemoryItem {
    pub id: Uuid,
    pub content: String,
    pub importance: f32,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Reason a working-memory item was archived to stale memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchivalReason {
    LruEviction,
    ManualArchive,
}

impl std::fmt::Display for ArchivalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LruEviction => "LRU_EVICTION",
            Self::ManualArchive => "MANUAL_ARCHIVE",
        };
        write!(f, "{s}")
    }
}

/// An archived working-memory item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaleMemoryItem {
    pub id: Uuid,
    pub original_content: String,
    pub archived_at: DateTime<Utc>,
    pub importance: f32,
    pub reason: ArchivalReason,
}

/// Action recorded against a constitutive-edge deletion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DeleteAttempt,
    DeleteSuccess,
}

/// Append-only audit entry; survives edge deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub project_id: String,
    pub edge_id: Uuid,
    pub action: AuditAction,
    pub blocked: bool,
    pub reason: String,
    pub actor: String,
    pub preserved_properties: Properties,
    pub timestamp: DateTime<Utc>,
}

/// Status of a dissonance/nuance review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NuanceStatus {
    PendingReview,
    Resolved,
}

/// Pending arbitration over two apparently conflicting edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NuanceReview {
    pub id: Uuid,
    pub status: NuanceStatus,
    pub edge_a: Uuid,
    pub edge_b: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Access level granted to a project in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Super,
    Shared,
    Isolated,
}

/// A registered multi-tenant partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRegistryEntry {
    pub project_id: String,
    pub display_name: String,
    pub access_level: AccessLevel,
}

/// A reader-project → target-project read grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadPermission {
    pub reader_project: String,
    pub target_project: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_maximal_entrenchment_overrides_supplied_value() {
        let mut props = Properties::new();
        props.insert("entrenchment_level", PropertyValue::String("low".into()));
        props.force_maximal_entrenchment();
        assert_eq!(props.entrenchment_level(), Some("maximal"));
    }

    #[test]
    fn is_superseded_checks_bool_and_status_substring() {
        let mut props = Properties::new();
        assert!(!props.is_superseded());

        props.insert("superseded", PropertyValue::Bool(true));
        assert!(props.is_superseded());

        let mut props2 = Properties::new();
        props2.insert(
            "status",
            PropertyValue::String("marked_superseded_by_x".into()),
        );
        assert!(props2.is_superseded());
    }

    #[test]
    fn merge_overwrites_existing_keys() {
        let mut base = Properties::new();
        base.insert("a", PropertyValue::Number(1.0));
        let mut patch = Properties::new();
        patch.insert("a", PropertyValue::Number(2.0));
        base.merge(patch);
        assert_eq!(base.get("a"), Some(&PropertyValue::Number(2.0)));
    }
}
