//! Typed property graph operations: upsert, traversal, pathfinding, and
//! constitutive-guarded deletion.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use uuid::Uuid;

use crate::constants::defaults;
use crate::decay::edge_relevance;
use crate::error::{Error, Result};
use crate::sector::classify_sector;
use crate::types::{Edge, MemorySector, Node, Properties};

/// Upsert a node keyed on `(project_id, name)`: an existing row has its
/// label and properties merged in; a missing row is created fresh.
#[must_use]
pub fn upsert_node(
    existing: Option<Node>,
    project_id: &str,
    label: &str,
    name: &str,
    properties: Properties,
) -> Node {
    match existing {
        Some(mut node) => {
            node.label = label.to_string();
            node.properties.merge(properties);
            node
        }
        None => Node {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            label: label.to_string(),
            name: name.to_string(),
            vector_id: properties.vector_id(),
            properties,
            created_at: Utc::now(),
        },
    }
}

/// Upsert an edge keyed on `(project_id, source_id, target_id, relation)`.
///
/// Constitutive edges always have `entrenchment_level` forced to `maximal`
/// regardless of caller-supplied properties, and their memory sector is
/// (re)classified from the merged property set on every call.
#[must_use]
pub fn upsert_edge(
    existing: Option<Edge>,
    project_id: &str,
    source_id: Uuid,
    target_id: Uuid,
    relation: &str,
    weight: f32,
    properties: Properties,
) -> Edge {
    let mut edge = match existing {
        Some(mut edge) => {
            edge.weight = weight;
            edge.properties.merge(properties);
            edge.modified_at = Utc::now();
            edge
        }
        None => Edge {
            id: Uuid::new_v4(),
            project_id: project_id.to_string(),
            source_id,
            target_id,
            relation: relation.to_string(),
            weight,
            properties,
            memory_sector: MemorySector::Semantic,
            access_count: 0,
            last_accessed: None,
            modified_at: Utc::now(),
        },
    };

    if edge.is_constitutive() {
        edge.properties.force_maximal_entrenchment();
    }
    edge.memory_sector = classify_sector(&edge.properties, &edge.relation);
    edge
}

/// A filter applied to a neighbor's or path edge's properties during traversal.
#[derive(Debug, Clone)]
pub enum PropertyFilter {
    /// The edge's `participants` list must contain this single value.
    ParticipantsContains(String),
    /// The edge's `participants` list must contain every value given.
    ParticipantsContainsAll(Vec<String>),
    /// An arbitrary property must equal the given string.
    Equals { key: String, value: String },
}

impl PropertyFilter {
    fn matches(&self, properties: &Properties) -> bool {
        match self {
            Self::ParticipantsContains(value) => properties
                .participants()
                .is_some_and(|p| p.iter().any(|v| v == value)),
            Self::ParticipantsContainsAll(values) => match properties.participants() {
                Some(p) => values.iter().all(|v| p.iter().any(|pv| pv == v)),
                None => false,
            },
            Self::Equals { key, value } => properties
                .get(key)
                .and_then(crate::types::PropertyValue::as_str)
                .is_some_and(|v| v == value),
        }
    }
}

/// Which side of an edge a neighbor was reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Outgoing,
    Incoming,
}

/// Traversal direction requested by a neighbor query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Outgoing,
    Incoming,
    #[default]
    Both,
}

/// One discovered neighbor, with the edge that reached it, the direction it
/// was reached through, and the shortest hop distance from the start node.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub node: Node,
    pub edge: Edge,
    pub direction: EdgeDirection,
    pub distance: u32,
}

/// Adjacency lookup the traversal functions need from the storage layer.
/// Implemented by the storage adapter; kept free of any I/O here so these
/// functions stay pure and unit-testable.
pub trait AdjacencyView {
    fn outgoing(&self, node_id: Uuid) -> Vec<(Edge, Node)>;
    fn incoming(&self, node_id: Uuid) -> Vec<(Edge, Node)>;
}

/// Parameters for [`neighbors`].
#[derive(Debug, Clone, Default)]
pub struct NeighborQuery {
    pub direction: Direction,
    pub max_depth: u32,
    pub relation_type: Option<String>,
    pub include_superseded: bool,
    pub filters: Vec<PropertyFilter>,
    pub sector_filter: Vec<MemorySector>,
}

/// Breadth-first neighbor listing bounded by `query.max_depth`, applying the
/// requested direction, relation/property/sector filters, and superseded-edge
/// handling along the way.
///
/// For a node reachable by more than one edge at the same (shortest) depth,
/// the higher-weight edge wins; ties break by the neighbor's name, matching
/// the traversal's documented tie-break rule. A node is never revisited once
/// discovered, so the traversal is cycle-safe.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `query.max_depth` is outside
/// `[MIN_NEIGHBOR_DEPTH, MAX_NEIGHBOR_DEPTH]`.
pub fn neighbors(adjacency: &impl AdjacencyView, start: Uuid, query: &NeighborQuery) -> Result<Vec<Neighbor>> {
    if query.max_depth < defaults::MIN_NEIGHBOR_DEPTH || query.max_depth > defaults::MAX_NEIGHBOR_DEPTH {
        return Err(Error::validation(
            "depth",
            format!(
                "must be between {} and {}",
                defaults::MIN_NEIGHBOR_DEPTH,
                defaults::MAX_NEIGHBOR_DEPTH
            ),
        ));
    }

    let mut visited = HashSet::from([start]);
    let mut frontier = vec![start];
    let mut found: HashMap<Uuid, Neighbor> = HashMap::new();
    let mut depth = 0u32;

    while depth < query.max_depth && !frontier.is_empty() {
        depth += 1;
        let mut candidates: HashMap<Uuid, Neighbor> = HashMap::new();

        for current in &frontier {
            let hop: Vec<(Edge, Node, EdgeDirection)> = match query.direction {
                Direction::Outgoing => adjacency
                    .outgoing(*current)
                    .into_iter()
                    .map(|(e, n)| (e, n, EdgeDirection::Outgoing))
                    .collect(),
                Direction::Incoming => adjacency
                    .incoming(*current)
                    .into_iter()
                    .map(|(e, n)| (e, n, EdgeDirection::Incoming))
                    .collect(),
                Direction::Both => adjacency
                    .outgoing(*current)
                    .into_iter()
                    .map(|(e, n)| (e, n, EdgeDirection::Outgoing))
                    .chain(
                        adjacency
                            .incoming(*current)
                            .into_iter()
                            .map(|(e, n)| (e, n, EdgeDirection::Incoming)),
                    )
                    .collect(),
            };

            for (edge, node, direction) in hop {
                if visited.contains(&node.id) {
                    continue;
                }
                if let Some(relation_type) = &query.relation_type {
                    if &edge.relation != relation_type {
                        continue;
                    }
                }
                if !query.include_superseded && edge.properties.is_superseded() {
                    continue;
                }
                if !query.sector_filter.is_empty() && !query.sector_filter.contains(&edge.memory_sector) {
                    continue;
                }
                if !query.filters.iter().all(|f| f.matches(&edge.properties)) {
                    continue;
                }

                candidates
                    .entry(node.id)
                    .and_modify(|existing: &mut Neighbor| {
                        if edge.weight > existing.edge.weight
                            || (edge.weight == existing.edge.weight && node.name < existing.node.name)
                        {
                            *existing = Neighbor {
                                node: node.clone(),
                                edge: edge.clone(),
                                direction,
                                distance: depth,
                            };
                        }
                    })
                    .or_insert(Neighbor {
                        node: node.clone(),
                        edge,
                        direction,
                        distance: depth,
                    });
            }
        }

        frontier = candidates.keys().copied().collect();
        for (id, neighbor) in candidates {
            visited.insert(id);
            found.insert(id, neighbor);
        }
    }

    Ok(found.into_values().collect())
}

/// A path from `start` to `end`, in traversal order.
#[derive(Debug, Clone)]
pub struct Path {
    pub edges: Vec<Edge>,
    pub total_weight: f32,
    /// Product of each edge's plain (non-IEF) relevance score, per 4.C.
    /// `1.0` for the trivial zero-length `start == end` path.
    pub path_relevance: f64,
}

impl Path {
    #[must_use]
    pub fn length(&self) -> usize {
        self.edges.len()
    }
}

/// Breadth-first search for up to [`defaults::MAX_PATHS_RETURNED`] paths
/// between `start` and `end`, ranked shortest-first then by descending
/// total edge weight, extending each partial path by one hop in either
/// direction. Callers apply [`defaults::PATHFINDING_STATEMENT_TIMEOUT`] at
/// the storage boundary (fetching the adjacency this function searches
/// over); this function itself is pure graph search.
///
/// If `start == end`, returns a single trivial length-0 path rather than
/// searching.
///
/// # Errors
///
/// Returns [`Error::Validation`] if `max_depth` is outside
/// `[MIN_PATH_DEPTH, MAX_PATH_DEPTH]`.
pub fn find_paths(
    adjacency: &impl AdjacencyView,
    start: Uuid,
    end: Uuid,
    max_depth: u32,
) -> Result<Vec<Path>> {
    if max_depth < defaults::MIN_PATH_DEPTH || max_depth > defaults::MAX_PATH_DEPTH {
        return Err(Error::validation(
            "max_depth",
            format!(
                "must be between {} and {}",
                defaults::MIN_PATH_DEPTH,
                defaults::MAX_PATH_DEPTH
            ),
        ));
    }

    if start == end {
        return Ok(vec![Path {
            edges: Vec::new(),
            total_weight: 0.0,
            path_relevance: 1.0,
        }]);
    }

    let now = Utc::now();
    let mut results = Vec::new();
    let mut queue = VecDeque::from([(start, Vec::<Edge>::new(), HashSet::from([start]))]);

    while let Some((current, path_so_far, visited)) = queue.pop_front() {
        if path_so_far.len() as u32 >= max_depth {
            continue;
        }
        let hop = adjacency
            .outgoing(current)
            .into_iter()
            .chain(adjacency.incoming(current));
        for (edge, node) in hop {
            if visited.contains(&node.id) {
                continue;
            }
            let mut next_path = path_so_far.clone();
            next_path.push(edge);
            if node.id == end {
                let total_weight = next_path.iter().map(|e| e.weight).sum();
                let path_relevance = next_path.iter().map(|e| edge_relevance(e, now)).product();
                results.push(Path {
                    edges: next_path,
                    total_weight,
                    path_relevance,
                });
                continue;
            }
            let mut next_visited = visited.clone();
            next_visited.insert(node.id);
            queue.push_back((node.id, next_path, next_visited));
        }
    }

    results.sort_by(|a, b| {
        a.length()
            .cmp(&b.length())
            .then(b.total_weight.total_cmp(&a.total_weight))
    });
    results.truncate(defaults::MAX_PATHS_RETURNED);
    Ok(results)
}

/// Outcome of a [`guard_delete`] check.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteDecision {
    /// Deletion is permitted; the caller should proceed and record a
    /// `DELETE_SUCCESS` audit entry.
    Allowed,
    /// Deletion is blocked; the caller should record a blocked
    /// `DELETE_ATTEMPT` audit entry and return `Error::ConstitutiveProtection`.
    Blocked,
}

/// Decide whether `edge` may be deleted, given whether bilateral consent
/// (`consent`) was supplied by the caller. Constitutive edges require
/// consent; all other edges are freely deletable.
#[must_use]
pub fn guard_delete(edge: &Edge, consent: bool) -> DeleteDecision {
    if edge.is_constitutive() && !consent {
        DeleteDecision::Blocked
    } else {
        DeleteDecision::Allowed
    }
}

/// Bump `access_count` and `last_accessed` on read, matching the
/// `GREATEST(COALESCE(count,0),0)+1` upsert semantics: never goes
/// backwards, never negative.
pub fn record_access(edge: &mut Edge) {
    edge.access_count = edge.access_count.saturating_add(1);
    edge.last_accessed = Some(Utc::now());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyValue;

    /// `(source, edge, target)` triples; `outgoing`/`incoming` both derive
    /// from the same edge list rather than needing it stored twice.
    struct FakeAdjacency {
        edges: Vec<(Node, Edge, Node)>,
    }

    impl AdjacencyView for FakeAdjacency {
        fn outgoing(&self, node_id: Uuid) -> Vec<(Edge, Node)> {
            self.edges
                .iter()
                .filter(|(from, _, _)| from.id == node_id)
                .map(|(_, e, to)| (e.clone(), to.clone()))
                .collect()
        }

        fn incoming(&self, node_id: Uuid) -> Vec<(Edge, Node)> {
            self.edges
                .iter()
                .filter(|(_, _, to)| to.id == node_id)
                .map(|(from, e, _)| (e.clone(), from.clone()))
                .collect()
        }
    }

    fn neighbor_query(direction: Direction, max_depth: u32) -> NeighborQuery {
        NeighborQuery {
            direction,
            max_depth,
            ..Default::default()
        }
    }

    fn make_node(name: &str) -> Node {
        Node {
            id: Uuid::new_v4(),
            project_id: "p".into(),
            label: "Person".into(),
            name: name.into(),
            properties: Properties::new(),
            vector_id: None,
            created_at: Utc::now(),
        }
    }

    fn make_edge(source: Uuid, target: Uuid, relation: &str, weight: f32) -> Edge {
        Edge {
            id: Uuid::new_v4(),
            project_id: "p".into(),
            source_id: source,
            target_id: target,
            relation: relation.into(),
            weight,
            properties: Properties::new(),
            memory_sector: MemorySector::Semantic,
            access_count: 0,
            last_accessed: None,
            modified_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_node_creates_when_absent() {
        let mut props = Properties::new();
        props.insert("vector_id", PropertyValue::Number(7.0));
        let node = upsert_node(None, "p", "Person", "Ada", props);
        assert_eq!(node.name, "Ada");
        assert_eq!(node.vector_id, Some(7));
    }

    #[test]
    fn upsert_node_merges_when_present() {
        let existing = make_node("Ada");
        let mut patch = Properties::new();
        patch.insert("title", PropertyValue::String("Countess".into()));
        let merged = upsert_node(Some(existing.clone()), "p", "Person", "Ada", patch);
        assert_eq!(merged.id, existing.id);
        assert_eq!(
            merged.properties.get("title"),
            Some(&PropertyValue::String("Countess".into()))
        );
    }

    #[test]
    fn upsert_edge_forces_maximal_entrenchment_for_constitutive() {
        let mut props = Properties::new();
        props.insert(
            "edge_type",
            PropertyValue::String("constitutive".into()),
        );
        props.insert(
            "entrenchment_level",
            PropertyValue::String("low".into()),
        );
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let edge = upsert_edge(None, "p", a, b, "LOVES", 1.0, props);
        assert_eq!(edge.properties.entrenchment_level(), Some("maximal"));
    }

    #[test]
    fn neighbors_rejects_out_of_range_depth() {
        let adjacency = FakeAdjacency { edges: vec![] };
        let err = neighbors(&adjacency, Uuid::new_v4(), &neighbor_query(Direction::Both, 0))
            .unwrap_err();
        assert_eq!(err.category(), "validation");
    }

    #[test]
    fn neighbors_does_not_revisit_nodes() {
        let a = make_node("a");
        let b = make_node("b");
        let edge_ab = make_edge(a.id, b.id, "KNOWS", 1.0);
        let edge_ba = make_edge(b.id, a.id, "KNOWS", 1.0);
        let adjacency = FakeAdjacency {
            edges: vec![
                (a.clone(), edge_ab, b.clone()),
                (b.clone(), edge_ba, a.clone()),
            ],
        };
        let result = neighbors(&adjacency, a.id, &neighbor_query(Direction::Both, 5)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].node.id, b.id);
    }

    #[test]
    fn neighbors_outgoing_only_ignores_incoming_edges() {
        let a = make_node("a");
        let b = make_node("b");
        let edge_ba = make_edge(b.id, a.id, "KNOWS", 1.0);
        let adjacency = FakeAdjacency {
            edges: vec![(b.clone(), edge_ba, a.clone())],
        };
        let result = neighbors(&adjacency, a.id, &neighbor_query(Direction::Outgoing, 3)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn find_paths_ranks_shortest_first_then_by_weight() {
        let a = make_node("a");
        let b = make_node("b");
        let c = make_node("c");
        let direct = make_edge(a.id, c.id, "REL", 1.0);
        let via_b1 = make_edge(a.id, b.id, "REL", 1.0);
        let via_b2 = make_edge(b.id, c.id, "REL", 1.0);
        let adjacency = FakeAdjacency {
            edges: vec![
                (a.clone(), direct, c.clone()),
                (a.clone(), via_b1, b.clone()),
                (b.clone(), via_b2, c.clone()),
            ],
        };
        let paths = find_paths(&adjacency, a.id, c.id, 5).unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].length(), 1);
        assert_eq!(paths[1].length(), 2);
    }

    #[test]
    fn find_paths_returns_trivial_path_when_start_equals_end() {
        let adjacency = FakeAdjacency { edges: vec![] };
        let id = Uuid::new_v4();
        let paths = find_paths(&adjacency, id, id, 5).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].length(), 0);
        assert!((paths[0].path_relevance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn guard_delete_blocks_constitutive_without_consent() {
        let mut edge = make_edge(Uuid::new_v4(), Uuid::new_v4(), "LOVES", 1.0);
        edge.properties.insert(
            "edge_type",
            PropertyValue::String("constitutive".into()),
        );
        assert_eq!(guard_delete(&edge, false), DeleteDecision::Blocked);
        assert_eq!(guard_delete(&edge, true), DeleteDecision::Allowed);
    }

    #[test]
    fn guard_delete_allows_descriptive_always() {
        let edge = make_edge(Uuid::new_v4(), Uuid::new_v4(), "LIKES", 1.0);
        assert_eq!(guard_delete(&edge, false), DeleteDecision::Allowed);
    }

    #[test]
    fn record_access_never_decreases() {
        let mut edge = make_edge(Uuid::new_v4(), Uuid::new_v4(), "LIKES", 1.0);
        record_access(&mut edge);
        record_access(&mut edge);
        assert_eq!(edge.access_count, 2);
        assert!(edge.last_accessed.is_some());
    }
}
