//! Tool dispatcher over `memory-core`'s domain operations.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use memory_core::audit::{attempt_delete, Actor};
use memory_core::constants::defaults;
use memory_core::decay;
use memory_core::decay::FeedbackState;
use memory_core::embeddings::EmbeddingProvider;
use memory_core::graph::{self, AdjacencyView, Direction, NeighborQuery, PropertyFilter};
use memory_core::hybrid::{self, Candidate, ChannelResults};
use memory_core::nuance::NuanceRegistry;
use memory_core::storage::{AuditStore, EpisodeStore, GraphStore, InsightStore};
use memory_core::types::{
    Edge, Episode, Insight, MemorySector, Node, Properties, PropertyValue, WorkingMemoryItem,
};
use memory_core::working_memory::WorkingMemory;
use memory_core::{Error, Result};

use crate::error::McpError;
use crate::types::ToolDescriptor;

/// Batch size used when resolving a known id against an `InsightStore`/
/// `EpisodeStore` list, since neither trait exposes a get-by-id lookup.
const LOOKUP_BATCH: usize = 1000;

/// Holds the storage/embedding handles a running server needs and dispatches
/// `tools/call` requests onto `memory-core`'s domain operations.
pub struct MemoryMcpServer {
    graph: Arc<dyn GraphStore>,
    insights: Arc<dyn InsightStore>,
    episodes: Arc<dyn EpisodeStore>,
    audit: Arc<dyn AuditStore>,
    embeddings: Arc<dyn EmbeddingProvider>,
    working_memory: Mutex<WorkingMemory>,
    nuance: Mutex<NuanceRegistry>,
    feedback: FeedbackState,
    fidelity_threshold: f32,
    rrf_k: f64,
}

impl MemoryMcpServer {
    #[must_use]
    pub fn new(
        graph: Arc<dyn GraphStore>,
        insights: Arc<dyn InsightStore>,
        episodes: Arc<dyn EpisodeStore>,
        audit: Arc<dyn AuditStore>,
        embeddings: Arc<dyn EmbeddingProvider>,
        working_memory_capacity: usize,
        fidelity_threshold: f32,
        rrf_k: f64,
    ) -> Self {
        Self {
            graph,
            insights,
            episodes,
            audit,
            embeddings,
            working_memory: Mutex::new(WorkingMemory::new(working_memory_capacity)),
            nuance: Mutex::new(NuanceRegistry::new()),
            feedback: FeedbackState::new(),
            fidelity_threshold,
            rrf_k,
        }
    }

    /// Replace the working-memory buffer's contents, re-inserting each item
    /// through the normal eviction path. Used at startup to restore a
    /// snapshot persisted by the redb cache tier.
    pub fn load_working_memory(&self, items: Vec<WorkingMemoryItem>) {
        let mut wm = self.working_memory.lock();
        for item in items {
            wm.insert(item);
        }
    }

    /// Snapshot the current working-memory buffer, for periodic persistence
    /// into the redb cache tier by the watchdog heartbeat.
    #[must_use]
    pub fn working_memory_snapshot(&self) -> Vec<WorkingMemoryItem> {
        self.working_memory.lock().items().to_vec()
    }

    /// The tool registry advertised via `tools/list`.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        vec![
            tool(
                "graph_add_node",
                "Create or update a node keyed on (project, name)",
                json!({"type":"object","required":["label","name"],"properties":{
                    "label":{"type":"string"},"name":{"type":"string"},
                    "properties":{"type":"object"},"vector_id":{"type":"integer"}}}),
            ),
            tool(
                "graph_add_edge",
                "Create or update an edge keyed on (project, source, target, relation)",
                json!({"type":"object","required":["source_name","target_name","relation"],"properties":{
                    "source_name":{"type":"string"},"target_name":{"type":"string"},
                    "relation":{"type":"string"},"source_label":{"type":"string"},
                    "target_label":{"type":"string"},"weight":{"type":"number"},
                    "properties":{"type":"object"}}}),
            ),
            tool(
                "graph_query_neighbors",
                "List neighbors of a node up to a bounded depth",
                json!({"type":"object","required":["node_name"],"properties":{
                    "node_name":{"type":"string"},"depth":{"type":"integer"},
                    "relation_type":{"type":"string"},
                    "direction":{"type":"string","enum":["both","outgoing","incoming"]},
                    "include_superseded":{"type":"boolean"},
                    "properties_filter":{"type":"object"},
                    "sector_filter":{"type":"array"},
                    "use_ief":{"type":"boolean"},
                    "query_embedding":{"type":"array","items":{"type":"number"}}}}),
            ),
            tool(
                "graph_find_path",
                "Find ranked paths between two nodes",
                json!({"type":"object","required":["start_node","end_node"],"properties":{
                    "start_node":{"type":"string"},"end_node":{"type":"string"},
                    "max_depth":{"type":"integer"},
                    "use_ief":{"type":"boolean"},
                    "query_embedding":{"type":"array","items":{"type":"number"}}}}),
            ),
            tool(
                "delete_edge",
                "Delete an edge, subject to the constitutive-edge guard",
                json!({"type":"object","required":["edge_id"],"properties":{
                    "edge_id":{"type":"string"},"consent_given":{"type":"boolean"}}}),
            ),
            tool(
                "get_node_by_name",
                "Look up a node; returns status=not_found rather than an error if absent",
                json!({"type":"object","required":["name"],"properties":{"name":{"type":"string"}}}),
            ),
            tool(
                "get_edge",
                "Look up an edge by (source, target, relation)",
                json!({"type":"object","required":["source_name","target_name","relation"],"properties":{
                    "source_name":{"type":"string"},"target_name":{"type":"string"},
                    "relation":{"type":"string"}}}),
            ),
            tool(
                "hybrid_search",
                "Reciprocal-rank-fused semantic/keyword/graph search",
                json!({"type":"object","required":["query_text"],"properties":{
                    "query_text":{"type":"string"},"top_k":{"type":"integer"},
                    "weights":{"type":"object"},
                    "tags_filter":{"type":"array"},
                    "date_from":{"type":"string"},"date_to":{"type":"string"},
                    "source_type_filter":{"type":"array"},
                    "sector_filter":{"type":"array"}}}),
            ),
            tool(
                "compress_to_l2_insight",
                "Compress source fragments into a durable insight",
                json!({"type":"object","required":["content","source_ids"],"properties":{
                    "content":{"type":"string"},"source_ids":{"type":"array"},
                    "tags":{"type":"array"},"memory_strength":{"type":"number"}}}),
            ),
            tool(
                "store_episode",
                "Store a query/reward/reflection episode",
                json!({"type":"object","required":["query","reward","reflection"],"properties":{
                    "query":{"type":"string"},"reward":{"type":"number"},
                    "reflection":{"type":"string"},"tags":{"type":"array"}}}),
            ),
            tool(
                "update_working_memory",
                "Insert into the bounded working-memory buffer",
                json!({"type":"object","required":["content"],"properties":{
                    "content":{"type":"string"},"importance":{"type":"number"}}}),
            ),
            tool(
                "delete_working_memory",
                "Remove a working-memory item by id (idempotent)",
                json!({"type":"object","required":["id"],"properties":{"id":{"type":"string"}}}),
            ),
            tool(
                "record_feedback",
                "Record helpful/unhelpful feedback on an IEF-scored result, feeding weight recalibration",
                json!({"type":"object","required":["query_id","helpful"],"properties":{
                    "query_id":{"type":"string"},"helpful":{"type":"boolean"},
                    "reason":{"type":"string"}}}),
            ),
        ]
    }

    /// Dispatch a `tools/call` invocation by name.
    pub async fn call_tool(&self, name: &str, arguments: &Value, project_id: &str) -> Value {
        let result = match name {
            "graph_add_node" => self.graph_add_node(arguments, project_id).await,
            "graph_add_edge" => self.graph_add_edge(arguments, project_id).await,
            "graph_query_neighbors" => self.graph_query_neighbors(arguments, project_id).await,
            "graph_find_path" => self.graph_find_path(arguments, project_id).await,
            "delete_edge" => self.delete_edge(arguments, project_id).await,
            "get_node_by_name" => self.get_node_by_name(arguments, project_id).await,
            "get_edge" => self.get_edge(arguments, project_id).await,
            "hybrid_search" => self.hybrid_search(arguments, project_id).await,
            "compress_to_l2_insight" => self.compress_to_l2_insight(arguments, project_id).await,
            "store_episode" => self.store_episode(arguments, project_id).await,
            "update_working_memory" => self.update_working_memory(arguments, project_id).await,
            "delete_working_memory" => self.delete_working_memory(arguments, project_id).await,
            "record_feedback" => self.record_feedback(arguments, project_id).await,
            other => Err(McpError::UnknownTool(other.to_string()).into()),
        };

        match result {
            Ok(value) => value,
            Err(err) => self.error_response(name, project_id, &err),
        }
    }

    fn error_response(&self, tool_name: &str, project_id: &str, err: &ToolError) -> Value {
        warn!(tool = tool_name, project_id, error = %err, "tool call failed");
        let (error, error_type) = match err {
            ToolError::Mcp(McpError::Core(Error::Validation { message, .. })) => {
                ("Parameter validation failed".to_string(), "validation")
            }
            ToolError::Mcp(McpError::Core(core_err)) => {
                (core_err.to_string(), core_err.category())
            }
            ToolError::Mcp(mcp_err) => (mcp_err.to_string(), "invalid_request"),
        };
        json!({
            "error": error,
            "details": err.to_string(),
            "tool": tool_name,
            "metadata": {"project_id": project_id},
            "error_type": error_type,
        })
    }

    async fn graph_add_node(&self, args: &Value, project_id: &str) -> ToolResult {
        let label = require_str(args, "label")?;
        let name = require_str(args, "name")?;
        let properties = parse_properties(args.get("properties"));
        let vector_id = args.get("vector_id").and_then(Value::as_i64);

        let existing = self.graph.find_node(project_id, name).await?;
        let created = existing.is_none();
        let mut properties = properties;
        if let Some(vid) = vector_id {
            properties.insert("vector_id", PropertyValue::Number(vid as f64));
        }
        let node = graph::upsert_node(existing, project_id, label, name, properties);
        let node_id = node.id;
        self.graph.put_node(node).await?;

        Ok(json!({
            "node_id": node_id,
            "created": created,
            "label": label,
            "name": name,
            "status": "success",
            "metadata": {"project_id": project_id},
        }))
    }

    async fn graph_add_edge(&self, args: &Value, project_id: &str) -> ToolResult {
        let source_name = require_str(args, "source_name")?;
        let target_name = require_str(args, "target_name")?;
        let relation = require_str(args, "relation")?;
        let weight = args.get("weight").and_then(Value::as_f64).unwrap_or(1.0) as f32;
        if !(0.0..=1.0).contains(&weight) {
            return Err(Error::validation("weight", "must be in [0, 1]").into());
        }
        let properties = parse_properties(args.get("properties"));

        let (source_node, source_created) = self
            .ensure_node(project_id, args.get("source_label"), source_name)
            .await?;
        let (target_node, target_created) = self
            .ensure_node(project_id, args.get("target_label"), target_name)
            .await?;

        let existing = self
            .graph
            .find_edge(project_id, source_node.id, target_node.id, relation)
            .await?;
        let created = existing.is_none();
        let edge = graph::upsert_edge(
            existing,
            project_id,
            source_node.id,
            target_node.id,
            relation,
            weight,
            properties,
        );
        let (edge_id, memory_sector) = (edge.id, edge.memory_sector);
        self.graph.put_edge(edge).await?;

        Ok(json!({
            "edge_id": edge_id,
            "created": created,
            "source_id": source_node.id,
            "target_id": target_node.id,
            "relation": relation,
            "weight": weight,
            "memory_sector": memory_sector.to_string(),
            "status": "success",
            "metadata": {"project_id": project_id},
            "source_node_created": source_created,
            "target_node_created": target_created,
        }))
    }

    async fn ensure_node(
        &self,
        project_id: &str,
        label: Option<&Value>,
        name: &str,
    ) -> Result<(Node, bool)> {
        if let Some(node) = self.graph.find_node(project_id, name).await? {
            return Ok((node, false));
        }
        let label = label.and_then(Value::as_str).unwrap_or("Entity");
        let node = graph::upsert_node(None, project_id, label, name, Properties::new());
        self.graph.put_node(node.clone()).await?;
        Ok((node, true))
    }

    async fn graph_query_neighbors(&self, args: &Value, project_id: &str) -> ToolResult {
        let start_time = Instant::now();
        let node_name = require_str(args, "node_name")?;
        let depth = args
            .get("depth")
            .and_then(Value::as_u64)
            .map(|d| d as u32)
            .unwrap_or(defaults::MIN_NEIGHBOR_DEPTH);
        let direction = parse_direction(args.get("direction"))?;
        let relation_type = args.get("relation_type").and_then(Value::as_str).map(str::to_string);
        let include_superseded = args.get("include_superseded").and_then(Value::as_bool).unwrap_or(false);
        let sector_filter: Vec<MemorySector> = args
            .get("sector_filter")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(parse_sector).collect())
            .unwrap_or_default();
        let filters = parse_properties_filter(args.get("properties_filter"))?;
        let use_ief = args.get("use_ief").and_then(Value::as_bool).unwrap_or(false);
        let query_embedding = parse_embedding(args.get("query_embedding"));

        let start_node = self
            .graph
            .find_node(project_id, node_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("node '{node_name}'")))?;

        let adjacency = self.fetch_adjacency(project_id, start_node.id, depth, None).await?;
        let query = NeighborQuery {
            direction,
            max_depth: depth,
            relation_type: relation_type.clone(),
            include_superseded,
            filters,
            sector_filter: sector_filter.clone(),
        };
        let found = graph::neighbors(&adjacency, start_node.id, &query)?;

        let now = Utc::now();
        let pending_nuance: HashSet<Uuid> = self.nuance.lock().get_pending_nuance_edge_ids().into_iter().collect();
        let query_id = Uuid::new_v4();
        let weights = self.feedback.current_weights();

        let mut scored: Vec<(graph::Neighbor, f64, Option<f64>)> = Vec::with_capacity(found.len());
        for neighbor in found {
            let relevance = decay::edge_relevance(&neighbor.edge, now);
            let ief = if use_ief {
                let similarity = self
                    .edge_similarity(project_id, &neighbor.edge, query_embedding.as_deref())
                    .await?;
                let recency = decay::recency_boost(Some(days_since(neighbor.edge.modified_at, now)));
                let inputs = decay::IefInputs {
                    relevance,
                    similarity,
                    recency,
                    is_constitutive: neighbor.edge.is_constitutive(),
                    has_pending_nuance_review: pending_nuance.contains(&neighbor.edge.id),
                };
                Some(decay::integrative_evaluation(&self.feedback, &inputs))
            } else {
                None
            };
            scored.push((neighbor, relevance, ief));
        }
        scored.sort_by(|a, b| {
            let key_a = a.2.unwrap_or(a.1);
            let key_b = b.2.unwrap_or(b.1);
            key_b.total_cmp(&key_a)
        });

        let mut neighbors = Vec::with_capacity(scored.len());
        for (neighbor, relevance, ief) in &scored {
            let mut stored = neighbor.edge.clone();
            graph::record_access(&mut stored);
            let _ = self.graph.put_edge(stored).await;

            let mut obj = json!({
                "node": serialize_node(&neighbor.node),
                "edge": serialize_edge(&neighbor.edge),
                "direction": match neighbor.direction {
                    graph::EdgeDirection::Outgoing => "outgoing",
                    graph::EdgeDirection::Incoming => "incoming",
                },
                "distance": neighbor.distance,
                "relevance_score": relevance,
            });
            if let Some(score) = ief {
                obj["ief"] = serialize_ief(*score, weights, query_id);
            }
            neighbors.push(obj);
        }

        Ok(json!({
            "neighbors": neighbors,
            "start_node": node_name,
            "query_params": {
                "depth": depth,
                "direction": direction_name(direction),
                "relation_type": relation_type,
                "include_superseded": include_superseded,
                "use_ief": use_ief,
            },
            "execution_time_ms": start_time.elapsed().as_millis(),
            "neighbor_count": neighbors.len(),
            "status": "success",
            "metadata": {"project_id": project_id},
        }))
    }

    async fn graph_find_path(&self, args: &Value, project_id: &str) -> ToolResult {
        let start_time = Instant::now();
        let start_name = require_str(args, "start_node")?;
        let end_name = require_str(args, "end_node")?;
        let max_depth = args
            .get("max_depth")
            .and_then(Value::as_u64)
            .map(|d| d as u32)
            .unwrap_or(5);
        let use_ief = args.get("use_ief").and_then(Value::as_bool).unwrap_or(false);
        let query_embedding = parse_embedding(args.get("query_embedding"));

        let start_node = self
            .graph
            .find_node(project_id, start_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("node '{start_name}'")))?;
        let end_node = self
            .graph
            .find_node(project_id, end_name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("node '{end_name}'")))?;

        // Pathfinding needs the full reachable adjacency up front since
        // `graph::find_paths` operates over an in-memory view; the statement
        // timeout is enforced while building it, surfacing as
        // `Error::Timeout` (error_type "timeout") rather than hanging.
        let adjacency = self
            .fetch_adjacency(
                project_id,
                start_node.id,
                max_depth,
                Some(defaults::PATHFINDING_STATEMENT_TIMEOUT),
            )
            .await?;
        let paths = graph::find_paths(&adjacency, start_node.id, end_node.id, max_depth)?;

        let now = Utc::now();
        let pending_nuance: HashSet<Uuid> = self.nuance.lock().get_pending_nuance_edge_ids().into_iter().collect();
        let query_id = Uuid::new_v4();
        let weights = self.feedback.current_weights();

        let mut serialized = Vec::with_capacity(paths.len());
        for path in &paths {
            let mut obj = json!({
                "edges": path.edges.iter().map(serialize_edge).collect::<Vec<_>>(),
                "length": path.length(),
                "total_weight": path.total_weight,
                "path_relevance": path.path_relevance,
            });
            if use_ief {
                let mut product = 1.0f64;
                for edge in &path.edges {
                    let similarity = self
                        .edge_similarity(project_id, edge, query_embedding.as_deref())
                        .await?;
                    let recency = decay::recency_boost(Some(days_since(edge.modified_at, now)));
                    let inputs = decay::IefInputs {
                        relevance: decay::edge_relevance(edge, now),
                        similarity,
                        recency,
                        is_constitutive: edge.is_constitutive(),
                        has_pending_nuance_review: pending_nuance.contains(&edge.id),
                    };
                    product *= decay::integrative_evaluation(&self.feedback, &inputs);
                }
                obj["path_ief"] = serialize_ief(product, weights, query_id);
            }
            serialized.push(obj);
        }

        let path_found = !paths.is_empty();
        Ok(json!({
            "path_found": path_found,
            "path_length": paths.first().map(graph::Path::length),
            "paths": serialized,
            "execution_time_ms": start_time.elapsed().as_millis(),
            "query_params": {"max_depth": max_depth, "use_ief": use_ief},
            "status": "success",
            "metadata": {"project_id": project_id},
        }))
    }

    /// Semantic similarity between `query_embedding` and the insight
    /// embedding identified by `edge`'s `vector_id` property, per 4.C.
    /// Falls back to `0.5` when either input is missing.
    async fn edge_similarity(
        &self,
        project_id: &str,
        edge: &Edge,
        query_embedding: Option<&[f32]>,
    ) -> Result<f64> {
        let (Some(query), Some(vector_id)) = (query_embedding, edge.properties.vector_id()) else {
            return Ok(0.5);
        };
        match self.insight_embedding(project_id, vector_id).await? {
            Some(embedding) => Ok(decay::cosine_similarity(query, &embedding)),
            None => Ok(0.5),
        }
    }

    async fn insight_embedding(&self, project_id: &str, insight_id: i64) -> Result<Option<Vec<f32>>> {
        let insights = self.insights.list(project_id, LOOKUP_BATCH).await?;
        Ok(insights.into_iter().find(|i| i.id == insight_id).map(|i| i.embedding))
    }

    /// Prefetch both directions of adjacency up to `max_depth` hops from
    /// `start`, into an in-memory view `graph::neighbors`/`graph::find_paths`
    /// can traverse synchronously. When `timeout` is set, aborts with
    /// `Error::Timeout` if fetching runs long, matching the pathfinding
    /// statement-timeout contract.
    async fn fetch_adjacency(
        &self,
        project_id: &str,
        start: Uuid,
        max_depth: u32,
        timeout: Option<std::time::Duration>,
    ) -> Result<BidirectionalAdjacency> {
        let fetch_start = Instant::now();
        let mut out_edges = Vec::new();
        let mut in_edges = Vec::new();
        let mut visited = HashSet::from([start]);
        let mut frontier = VecDeque::from([(start, 0u32)]);
        while let Some((current, depth)) = frontier.pop_front() {
            if depth >= max_depth {
                continue;
            }
            if let Some(limit) = timeout {
                if fetch_start.elapsed() > limit {
                    return Err(Error::Timeout(limit));
                }
            }
            for (edge, node) in self.graph.outgoing_edges(project_id, current).await? {
                out_edges.push((current, edge, node.clone()));
                if visited.insert(node.id) {
                    frontier.push_back((node.id, depth + 1));
                }
            }
            for (edge, node) in self.graph.incoming_edges(project_id, current).await? {
                in_edges.push((current, edge, node.clone()));
                if visited.insert(node.id) {
                    frontier.push_back((node.id, depth + 1));
                }
            }
        }
        Ok(BidirectionalAdjacency { out_edges, in_edges })
    }

    async fn delete_edge(&self, args: &Value, project_id: &str) -> ToolResult {
        let edge_id = require_uuid(args, "edge_id")?;
        let consent = args.get("consent_given").and_then(Value::as_bool).unwrap_or(false);

        let edge = self
            .graph
            .find_edge_by_id(project_id, edge_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("edge {edge_id}")))?;
        let was_constitutive = edge.is_constitutive();

        let (entry, decision) = attempt_delete(&edge, consent, Actor::Io);
        self.audit.append(entry).await?;
        decision?;

        self.graph.delete_edge(project_id, edge_id).await?;

        Ok(json!({
            "deleted": true,
            "edge_id": edge_id,
            "was_constitutive": was_constitutive,
            "metadata": {"project_id": project_id},
        }))
    }

    async fn get_node_by_name(&self, args: &Value, project_id: &str) -> ToolResult {
        let name = require_str(args, "name")?;
        let node = self.graph.find_node(project_id, name).await?;
        Ok(match node {
            Some(node) => json!({
                "node": serialize_node(&node),
                "status": "found",
                "metadata": {"project_id": project_id},
            }),
            None => json!({
                "node": Value::Null,
                "status": "not_found",
                "metadata": {"project_id": project_id},
            }),
        })
    }

    async fn get_edge(&self, args: &Value, project_id: &str) -> ToolResult {
        let source_name = require_str(args, "source_name")?;
        let target_name = require_str(args, "target_name")?;
        let relation = require_str(args, "relation")?;

        let source = self.graph.find_node(project_id, source_name).await?;
        let target = self.graph.find_node(project_id, target_name).await?;
        let (Some(source), Some(target)) = (source, target) else {
            return Ok(json!({
                "edge": Value::Null,
                "status": "not_found",
                "metadata": {"project_id": project_id},
            }));
        };

        let edge = self
            .graph
            .find_edge(project_id, source.id, target.id, relation)
            .await?;
        Ok(match edge {
            Some(edge) => json!({
                "edge": serialize_edge(&edge),
                "status": "found",
                "metadata": {"project_id": project_id},
            }),
            None => json!({
                "edge": Value::Null,
                "status": "not_found",
                "metadata": {"project_id": project_id},
            }),
        })
    }

    async fn hybrid_search(&self, args: &Value, project_id: &str) -> ToolResult {
        let query_text = require_str(args, "query_text")?;
        let top_k = args
            .get("top_k")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(defaults::DEFAULT_TOP_K)
            .clamp(1, defaults::MAX_TOP_K);

        let entities = hybrid::extract_entities(query_text);
        let relational = hybrid::is_relational_query(query_text, &entities);
        let (default_semantic, default_keyword, default_graph) = hybrid::channel_weights(relational);
        let (semantic_weight, keyword_weight, graph_weight) =
            apply_weight_override(args.get("weights"), (default_semantic, default_keyword, default_graph));

        let sector_filter: Vec<MemorySector> = args
            .get("sector_filter")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(parse_sector).collect())
            .unwrap_or_default();
        let tags_filter: Vec<String> = args
            .get("tags_filter")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let date_from = parse_date(args.get("date_from"), "date_from")?;
        let date_to = parse_date(args.get("date_to"), "date_to")?;
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from > to {
                return Err(Error::validation("date_from", "must not be after date_to").into());
            }
        }
        let source_type_filter: Vec<String> = args
            .get("source_type_filter")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let channel_enabled = |name: &str| source_type_filter.is_empty() || source_type_filter.iter().any(|s| s == name);

        let insights = self.insights.list(project_id, LOOKUP_BATCH.max(top_k * 4)).await?;
        let filtered_insights: Vec<&Insight> = insights
            .iter()
            .filter(|i| matches_insight_filters(i, &tags_filter, date_from, date_to))
            .collect();

        let (semantic_candidates, semantic_count) = if channel_enabled("l2_insight") {
            let query_embedding = self.embeddings.embed(query_text).await?;
            let mut scored: Vec<(&Insight, f64)> = filtered_insights
                .iter()
                .map(|i| (*i, decay::cosine_similarity(&query_embedding, &i.embedding)))
                .collect();
            scored.sort_by(|(_, a), (_, b)| b.total_cmp(a));
            let candidates: Vec<Candidate> = scored.into_iter().map(|(i, _)| to_candidate(i)).collect();
            let count = candidates.len();
            (candidates, count)
        } else {
            (Vec::new(), 0)
        };

        let (keyword_candidates, keyword_count) = if channel_enabled("l2_insight") {
            let lowered = query_text.to_lowercase();
            let candidates: Vec<Candidate> = filtered_insights
                .iter()
                .filter(|i| i.content.to_lowercase().contains(&lowered))
                .map(|i| to_candidate(i))
                .collect();
            let count = candidates.len();
            (candidates, count)
        } else {
            (Vec::new(), 0)
        };

        let (graph_candidates, graph_count) = if channel_enabled("graph") {
            let candidates = self
                .graph_search_candidates(project_id, &entities, &sector_filter, &insights)
                .await?;
            let count = candidates.len();
            (candidates, count)
        } else {
            (Vec::new(), 0)
        };

        let channels = vec![
            ChannelResults { weight: semantic_weight, ranked: semantic_candidates },
            ChannelResults { weight: keyword_weight, ranked: keyword_candidates },
            ChannelResults { weight: graph_weight, ranked: graph_candidates },
        ];
        let fused = hybrid::reciprocal_rank_fusion(&channels, self.rrf_k);

        let results: Vec<Value> = fused
            .into_iter()
            .take(top_k)
            .map(|r| json!({
                "id": r.id,
                "rrf_score": r.rrf_score,
                "score": r.score,
                "metadata": {"project_id": project_id},
            }))
            .collect();

        Ok(json!({
            "results": results,
            "semantic_results_count": semantic_count,
            "keyword_results_count": keyword_count,
            "graph_results_count": graph_count,
            "applied_weights": {"semantic": semantic_weight, "keyword": keyword_weight, "graph": graph_weight},
            "applied_filters": {
                "sector_filter": sector_filter.iter().map(MemorySector::to_string).collect::<Vec<_>>(),
                "tags_filter": tags_filter,
                "date_from": date_from.map(|d| d.to_rfc3339()),
                "date_to": date_to.map(|d| d.to_rfc3339()),
                "source_type_filter": source_type_filter,
            },
            "status": "success",
            "metadata": {"project_id": project_id},
            "project_id": project_id,
        }))
    }

    /// Graph retrieval channel: 2-hop neighbor expansion from each extracted
    /// entity that resolves to a node, collecting candidates by following
    /// each neighbor's `vector_id` into the insight pool already fetched for
    /// the semantic/keyword channels, ranked by traversal distance then edge
    /// weight.
    async fn graph_search_candidates(
        &self,
        project_id: &str,
        entities: &[String],
        sector_filter: &[MemorySector],
        insight_pool: &[Insight],
    ) -> Result<Vec<Candidate>> {
        let lookup: HashMap<i64, &Insight> = insight_pool.iter().map(|i| (i.id, i)).collect();
        let mut ranked: HashMap<i64, (u32, f32)> = HashMap::new();

        for entity in entities {
            let Some(node) = self.graph.find_node(project_id, entity).await? else {
                continue;
            };
            let adjacency = self
                .fetch_adjacency(project_id, node.id, defaults::GRAPH_SEARCH_HOPS, None)
                .await?;
            let query = NeighborQuery {
                direction: Direction::Both,
                max_depth: defaults::GRAPH_SEARCH_HOPS,
                sector_filter: sector_filter.to_vec(),
                ..NeighborQuery::default()
            };
            for neighbor in graph::neighbors(&adjacency, node.id, &query)? {
                let Some(vector_id) = neighbor.node.vector_id else {
                    continue;
                };
                ranked
                    .entry(vector_id)
                    .and_modify(|(dist, weight)| {
                        if neighbor.distance < *dist
                            || (neighbor.distance == *dist && neighbor.edge.weight > *weight)
                        {
                            *dist = neighbor.distance;
                            *weight = neighbor.edge.weight;
                        }
                    })
                    .or_insert((neighbor.distance, neighbor.edge.weight));
            }
        }

        let mut entries: Vec<(i64, u32, f32)> = ranked.into_iter().map(|(id, (d, w))| (id, d, w)).collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then(b.2.total_cmp(&a.2)));
        Ok(entries
            .into_iter()
            .filter_map(|(id, _, _)| lookup.get(&id).map(|i| to_candidate(i)))
            .collect())
    }

    async fn compress_to_l2_insight(&self, args: &Value, project_id: &str) -> ToolResult {
        let content = require_str(args, "content")?;
        let source_ids: Vec<String> = args
            .get("source_ids")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::validation("source_ids", "must be a non-empty array"))?
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        if source_ids.is_empty() {
            return Err(Error::validation("source_ids", "must be a non-empty array").into());
        }
        let tags: Vec<String> = args
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let memory_strength = args
            .get("memory_strength")
            .and_then(Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(defaults::DEFAULT_MEMORY_STRENGTH);
        if !(0.0..=1.0).contains(&memory_strength) {
            return Err(Error::validation("memory_strength", "must be in [0, 1]").into());
        }

        let embedding = self.embeddings.embed(content).await?;

        // Fidelity: how well the new embedding matches the mean embedding of
        // its claimed sources (resolved against the insight and episode
        // stores). Sources that don't resolve to either are silently
        // skipped; if none resolve, `cosine_similarity`'s empty-vector
        // fallback of 0.5 applies.
        let mean_source_embedding = self.mean_source_embedding(project_id, &source_ids).await?;
        let fidelity_score = match mean_source_embedding {
            Some(mean) => decay::cosine_similarity(&embedding, &mean),
            None => 0.5,
        };
        let mut metadata = json!({});
        if fidelity_score < f64::from(self.fidelity_threshold) {
            metadata["fidelity_warning"] = json!(true);
        }

        let insight = Insight {
            id: 0,
            project_id: project_id.to_string(),
            content: content.to_string(),
            embedding,
            source_ids,
            memory_strength,
            metadata,
            tags,
            created_at: chrono::Utc::now(),
        };
        let id = self.insights.insert(insight).await?;

        Ok(json!({
            "id": id,
            "embedding_status": "success",
            "fidelity_score": fidelity_score,
            "memory_strength": memory_strength,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }))
    }

    /// Mean embedding of `source_ids` resolved against the insight and
    /// episode stores (matched by stringified id), in that order. `None` if
    /// no source id resolves to anything.
    async fn mean_source_embedding(&self, project_id: &str, source_ids: &[String]) -> Result<Option<Vec<f32>>> {
        let insights = self.insights.list(project_id, LOOKUP_BATCH).await?;
        let episodes = self.episodes.list(project_id, LOOKUP_BATCH).await?;

        let mut vectors: Vec<&Vec<f32>> = Vec::new();
        for id in source_ids {
            if let Some(insight) = insights.iter().find(|i| i.id.to_string() == *id) {
                vectors.push(&insight.embedding);
            } else if let Some(episode) = episodes.iter().find(|e| e.id.to_string() == *id) {
                vectors.push(&episode.query_embedding);
            }
        }
        let Some(dim) = vectors.first().map(|v| v.len()) else {
            return Ok(None);
        };

        let mut mean = vec![0.0f32; dim];
        let mut count = 0usize;
        for v in &vectors {
            if v.len() != dim {
                continue;
            }
            for (acc, value) in mean.iter_mut().zip(v.iter()) {
                *acc += *value;
            }
            count += 1;
        }
        if count == 0 {
            return Ok(None);
        }
        for acc in &mut mean {
            *acc /= count as f32;
        }
        Ok(Some(mean))
    }

    async fn store_episode(&self, args: &Value, project_id: &str) -> ToolResult {
        let query = require_str(args, "query")?;
        let reward = args
            .get("reward")
            .and_then(Value::as_f64)
            .ok_or_else(|| Error::validation("reward", "is required"))? as f32;
        if !(-1.0..=1.0).contains(&reward) {
            return Err(Error::validation("reward", "must be in [-1, 1]").into());
        }
        let reflection = require_str(args, "reflection")?;
        let tags: Vec<String> = args
            .get("tags")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let query_embedding = self.embeddings.embed(query).await?;
        let episode = Episode {
            id: 0,
            project_id: project_id.to_string(),
            query: query.to_string(),
            reward,
            reflection: reflection.to_string(),
            query_embedding,
            tags,
            metadata: json!({}),
            created_at: chrono::Utc::now(),
        };
        let id = self.episodes.insert(episode).await?;

        Ok(json!({
            "id": id,
            "embedding_status": "success",
            "query": query,
            "reward": reward,
            "created_at": chrono::Utc::now().to_rfc3339(),
        }))
    }

    async fn update_working_memory(&self, args: &Value, project_id: &str) -> ToolResult {
        let content = require_str(args, "content")?;
        let importance = args
            .get("importance")
            .and_then(Value::as_f64)
            .map(|v| v as f32)
            .unwrap_or(0.5);
        if !(0.0..=1.0).contains(&importance) {
            return Err(Error::validation("importance", "must be in [0, 1]").into());
        }

        let item = WorkingMemoryItem {
            id: Uuid::new_v4(),
            content: content.to_string(),
            importance,
            last_accessed: chrono::Utc::now(),
            created_at: chrono::Utc::now(),
        };
        let added_id = item.id;
        let outcome = self.working_memory.lock().insert(item);

        let mut response = json!({
            "status": "success",
            "added_id": added_id,
            "metadata": {"project_id": project_id},
        });
        if let Some(outcome) = outcome {
            response["evicted_id"] = json!(outcome.evicted.id);
            response["archived_id"] = json!(outcome.evicted.id);
            let _ = outcome.forced;
        }
        Ok(response)
    }

    async fn delete_working_memory(&self, args: &Value, project_id: &str) -> ToolResult {
        let id = require_uuid(args, "id")?;
        let mut wm = self.working_memory.lock();
        let before = wm.len();
        // WorkingMemory doesn't expose a direct remove-by-id; emulate it by
        // rebuilding without the matching item, which keeps eviction logic
        // untouched for this rarely-hit admin path.
        let remaining: Vec<_> = wm.items().iter().filter(|i| i.id != id).cloned().collect();
        let found = remaining.len() != before;
        *wm = WorkingMemory::new(wm.items().len().max(1));
        for item in remaining {
            wm.insert(item);
        }
        let _ = project_id;

        Ok(json!({
            "status": if found { "success" } else { "not_found" },
            "deleted_id": id,
        }))
    }

    async fn record_feedback(&self, args: &Value, project_id: &str) -> ToolResult {
        let query_id = require_uuid(args, "query_id")?;
        let helpful = args
            .get("helpful")
            .and_then(Value::as_bool)
            .ok_or_else(|| Error::validation("helpful", "is required and must be a boolean"))?;
        let reason = args.get("reason").and_then(Value::as_str).map(str::to_string);

        self.feedback.record_feedback(if helpful { 1.0 } else { 0.0 });
        let (w_r, w_s, w_t, w_c) = self.feedback.current_weights();

        Ok(json!({
            "status": "success",
            "query_id": query_id,
            "helpful": helpful,
            "reason": reason,
            "weights": {"relevance": w_r, "similarity": w_s, "recency": w_t, "constitutive": w_c},
            "metadata": {"project_id": project_id},
        }))
    }
}

fn tool(name: &str, description: &str, input_schema: Value) -> ToolDescriptor {
    ToolDescriptor {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn to_candidate(insight: &Insight) -> Candidate {
    Candidate {
        id: insight_uuid(&insight.project_id, insight.id),
        content: insight.content.clone(),
        memory_sector: MemorySector::Semantic,
        memory_strength: insight.memory_strength,
        project_id: insight.project_id.clone(),
    }
}

/// Deterministic id for an insight, stable across channels so RRF fusion
/// (keyed on `Candidate::id`) recognizes the same insight surfaced by more
/// than one retrieval channel.
fn insight_uuid(project_id: &str, insight_id: i64) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("insight:{project_id}:{insight_id}").as_bytes(),
    )
}

fn matches_insight_filters(
    insight: &Insight,
    tags_filter: &[String],
    date_from: Option<DateTime<Utc>>,
    date_to: Option<DateTime<Utc>>,
) -> bool {
    if !tags_filter.is_empty() && !tags_filter.iter().any(|t| insight.tags.contains(t)) {
        return false;
    }
    if date_from.is_some_and(|from| insight.created_at < from) {
        return false;
    }
    if date_to.is_some_and(|to| insight.created_at > to) {
        return false;
    }
    true
}

fn parse_date(value: Option<&Value>, field: &str) -> std::result::Result<Option<DateTime<Utc>>, ToolError> {
    match value.and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| Error::validation(field, "must be an RFC3339 timestamp").into()),
    }
}

/// Caller-supplied `{semantic, keyword, graph}` weights override the
/// defaults; any combination that doesn't already sum to 1 is renormalized
/// rather than rejected.
fn apply_weight_override(value: Option<&Value>, defaults: (f64, f64, f64)) -> (f64, f64, f64) {
    let Some(map) = value.and_then(Value::as_object) else {
        return defaults;
    };
    let (default_s, default_k, default_g) = defaults;
    let s = map.get("semantic").and_then(Value::as_f64).unwrap_or(default_s);
    let k = map.get("keyword").and_then(Value::as_f64).unwrap_or(default_k);
    let g = map.get("graph").and_then(Value::as_f64).unwrap_or(default_g);
    let sum = s + k + g;
    if sum > 0.0 {
        (s / sum, k / sum, g / sum)
    } else {
        defaults
    }
}

fn parse_direction(value: Option<&Value>) -> std::result::Result<Direction, ToolError> {
    match value.and_then(Value::as_str) {
        None | Some("both") => Ok(Direction::Both),
        Some("outgoing") => Ok(Direction::Outgoing),
        Some("incoming") => Ok(Direction::Incoming),
        Some(other) => Err(Error::validation("direction", format!("unknown direction '{other}'")).into()),
    }
}

fn direction_name(direction: Direction) -> &'static str {
    match direction {
        Direction::Both => "both",
        Direction::Outgoing => "outgoing",
        Direction::Incoming => "incoming",
    }
}

/// Parse the `properties_filter` object per its documented semantics: a
/// `participants` string is array-membership, `participants_contains_all`
/// (an array) is array-containment, and every other key/value pair is plain
/// object containment. Invalid shapes are a validation error.
fn parse_properties_filter(value: Option<&Value>) -> std::result::Result<Vec<PropertyFilter>, ToolError> {
    let Some(Value::Object(map)) = value else {
        return Ok(Vec::new());
    };
    let mut filters = Vec::with_capacity(map.len());
    for (key, value) in map {
        match key.as_str() {
            "participants" => {
                let value = value
                    .as_str()
                    .ok_or_else(|| Error::validation("properties_filter.participants", "must be a string"))?;
                filters.push(PropertyFilter::ParticipantsContains(value.to_string()));
            }
            "participants_contains_all" => {
                let items = value.as_array().ok_or_else(|| {
                    Error::validation("properties_filter.participants_contains_all", "must be an array")
                })?;
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let item = item.as_str().ok_or_else(|| {
                        Error::validation(
                            "properties_filter.participants_contains_all",
                            "must be an array of strings",
                        )
                    })?;
                    values.push(item.to_string());
                }
                filters.push(PropertyFilter::ParticipantsContainsAll(values));
            }
            other => {
                let value = value
                    .as_str()
                    .ok_or_else(|| Error::validation("properties_filter", format!("value for '{other}' must be a string")))?;
                filters.push(PropertyFilter::Equals { key: other.to_string(), value: value.to_string() });
            }
        }
    }
    Ok(filters)
}

fn parse_embedding(value: Option<&Value>) -> Option<Vec<f32>> {
    value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
}

fn days_since(past: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - past).num_seconds() as f64 / 86_400.0
}

/// Serialize one IEF evaluation result per 4.C: the composite score, its
/// components (folded into the caller via `obj["ief"]`/`obj["path_ief"]`
/// rather than here), the weights in effect, and an opaque feedback-request
/// correlation id with the helpful/reason fields left unset.
fn serialize_ief(score: f64, weights: (f64, f64, f64, f64), query_id: Uuid) -> Value {
    json!({
        "score": score,
        "weights": {
            "relevance": weights.0,
            "similarity": weights.1,
            "recency": weights.2,
            "constitutive": weights.3,
        },
        "feedback_request": {
            "query_id": query_id,
            "helpful": Value::Null,
            "reason": Value::Null,
        },
    })
}

fn parse_sector(value: &Value) -> Option<MemorySector> {
    match value.as_str()? {
        "emotional" => Some(MemorySector::Emotional),
        "episodic" => Some(MemorySector::Episodic),
        "semantic" => Some(MemorySector::Semantic),
        "procedural" => Some(MemorySector::Procedural),
        "reflective" => Some(MemorySector::Reflective),
        _ => None,
    }
}

fn require_str<'a>(args: &'a Value, key: &str) -> std::result::Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::validation(key, "is required and must be a string").into())
}

fn require_uuid(args: &Value, key: &str) -> std::result::Result<Uuid, ToolError> {
    let raw = require_str(args, key)?;
    Uuid::parse_str(raw).map_err(|_| Error::validation(key, "must be a valid UUID").into())
}

fn parse_properties(value: Option<&Value>) -> Properties {
    let mut properties = Properties::new();
    if let Some(Value::Object(map)) = value {
        for (k, v) in map {
            properties.insert(k.clone(), PropertyValue::from(v.clone()));
        }
    }
    properties
}

fn serialize_node(node: &Node) -> Value {
    json!({
        "id": node.id,
        "label": node.label,
        "name": node.name,
        "vector_id": node.vector_id,
    })
}

fn serialize_edge(edge: &Edge) -> Value {
    json!({
        "id": edge.id,
        "source_id": edge.source_id,
        "target_id": edge.target_id,
        "relation": edge.relation,
        "weight": edge.weight,
        "memory_sector": edge.memory_sector.to_string(),
        "access_count": edge.access_count,
    })
}

/// In-memory adjacency prefetched from the storage adapter, split into
/// outgoing `(from, edge, to)` and incoming `(to, edge, from)` triples so
/// both directions resolve without a second round-trip.
struct BidirectionalAdjacency {
    out_edges: Vec<(Uuid, Edge, Node)>,
    in_edges: Vec<(Uuid, Edge, Node)>,
}

impl AdjacencyView for BidirectionalAdjacency {
    fn outgoing(&self, node_id: Uuid) -> Vec<(Edge, Node)> {
        self.out_edges
            .iter()
            .filter(|(from, _, _)| *from == node_id)
            .map(|(_, e, n)| (e.clone(), n.clone()))
            .collect()
    }

    fn incoming(&self, node_id: Uuid) -> Vec<(Edge, Node)> {
        self.in_edges
            .iter()
            .filter(|(to, _, _)| *to == node_id)
            .map(|(_, e, n)| (e.clone(), n.clone()))
            .collect()
    }
}

/// Internal error type unifying [`McpError`] across tool handlers.
#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error(transparent)]
    Mcp(#[from] McpError),
}

impl From<Error> for ToolError {
    fn from(err: Error) -> Self {
        Self::Mcp(McpError::Core(err))
    }
}

type ToolResult = std::result::Result<Value, ToolError>;
