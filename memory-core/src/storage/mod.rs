//! Storage adapter trait implemented by the durable (Turso/libsql) and
//! cache-tier (redb) backend crates.
//!
//! Every method is scoped to a single project via an explicit `project_id`
//! parameter rather than an ambient session variable, matching the
//! project-id-scoped row filtering used throughout the domain layer.

pub mod circuit_breaker;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    AuditLogEntry, Edge, Episode, Insight, Node, NuanceReview, ProjectRegistryEntry,
    RawDialogueEntry, ReadPermission, StaleMemoryItem, WorkingMemoryItem,
};

/// Durable storage operations over the typed property graph and the
/// tiered-memory record types. Implementations own connection pooling,
/// statement timeouts, and retry/backoff; this trait only describes the
/// domain-level operations callers need.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Fetch a node by `(project_id, name)`, if it exists.
    async fn find_node(&self, project_id: &str, name: &str) -> Result<Option<Node>>;

    /// Persist `node` (caller has already computed the merged upsert).
    async fn put_node(&self, node: Node) -> Result<()>;

    /// Fetch an edge by `(project_id, source_id, target_id, relation)`.
    async fn find_edge(
        &self,
        project_id: &str,
        source_id: Uuid,
        target_id: Uuid,
        relation: &str,
    ) -> Result<Option<Edge>>;

    /// Fetch an edge directly by its primary key, scoped to `project_id`.
    async fn find_edge_by_id(&self, project_id: &str, edge_id: Uuid) -> Result<Option<Edge>>;

    /// Persist `edge` (caller has already computed the merged upsert).
    async fn put_edge(&self, edge: Edge) -> Result<()>;

    /// All outgoing edges from `node_id` within `project_id`, paired with
    /// their target node.
    async fn outgoing_edges(&self, project_id: &str, node_id: Uuid) -> Result<Vec<(Edge, Node)>>;

    /// All incoming edges into `node_id` within `project_id`, paired with
    /// their source node.
    async fn incoming_edges(&self, project_id: &str, node_id: Uuid) -> Result<Vec<(Edge, Node)>>;

    /// Delete an edge row. Called only after the constitutive guard has
    /// already approved the deletion.
    async fn delete_edge(&self, project_id: &str, edge_id: Uuid) -> Result<()>;
}

/// Append-only audit log persistence. Audit rows are never deleted and
/// carry their own copy of the edge's properties, so they survive the
/// edge row being removed.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditLogEntry) -> Result<()>;
    async fn recent(&self, project_id: &str, limit: usize) -> Result<Vec<AuditLogEntry>>;
}

/// L2 insight storage (compressed semantic fragments).
#[async_trait]
pub trait InsightStore: Send + Sync {
    async fn insert(&self, insight: Insight) -> Result<i64>;
    async fn list(&self, project_id: &str, limit: usize) -> Result<Vec<Insight>>;
}

/// Episode storage (query/reward/reflection tuples).
#[async_trait]
pub trait EpisodeStore: Send + Sync {
    async fn insert(&self, episode: Episode) -> Result<i64>;
    async fn list(&self, project_id: &str, limit: usize) -> Result<Vec<Episode>>;
}

/// Append-only raw dialogue log (L0 tier).
#[async_trait]
pub trait RawDialogueStore: Send + Sync {
    async fn append(&self, entry: RawDialogueEntry) -> Result<()>;
    async fn since(&self, session_id: Uuid, limit: usize) -> Result<Vec<RawDialogueEntry>>;
}

/// Durable persistence for the working-memory buffer and its archive,
/// backing the in-process [`crate::working_memory::WorkingMemory`].
#[async_trait]
pub trait WorkingMemoryStore: Send + Sync {
    async fn snapshot(&self, project_id: &str) -> Result<Vec<WorkingMemoryItem>>;
    async fn persist(&self, project_id: &str, items: Vec<WorkingMemoryItem>) -> Result<()>;
    async fn archive(&self, project_id: &str, item: StaleMemoryItem) -> Result<()>;
    async fn stale(&self, project_id: &str, limit: usize) -> Result<Vec<StaleMemoryItem>>;
}

/// Nuance-review persistence backing [`crate::nuance::NuanceRegistry`].
#[async_trait]
pub trait NuanceStore: Send + Sync {
    async fn put(&self, review: NuanceReview) -> Result<()>;
    async fn pending(&self, project_id: &str) -> Result<Vec<NuanceReview>>;
}

/// Multi-tenant project registry and cross-project read grants.
#[async_trait]
pub trait TenancyStore: Send + Sync {
    async fn get_project(&self, project_id: &str) -> Result<Option<ProjectRegistryEntry>>;
    async fn register_project(&self, entry: ProjectRegistryEntry) -> Result<()>;
    async fn grants_for(&self, reader_project: &str) -> Result<Vec<ReadPermission>>;
    async fn grant(&self, permission: ReadPermission) -> Result<()>;
}
