//! Undirected graph topology with stable, dense edge ids.
//!
//! # Overview
//!
//! [`GraphStore`] wraps a [`petgraph`] undirected graph whose node weights are
//! the opaque node keys of the upstream network (OSM node ids for road
//! graphs). Edge ids are petgraph edge indices: they are assigned once when
//! the graph is built and run densely over `[0, |E|)`.
//!
//! On top of the petgraph adjacency the store keeps a flat incidence index
//! (CSR layout) so a node's incident edges can be read as a slice. Each
//! node's list is ordered by ascending edge id, and an edge appears in the
//! list of both endpoints. A self-loop therefore appears twice in its node's
//! list.
//!
//! A diffusion round walks the lists of both endpoints, so a self-loop's
//! own vector enters its mean four times (twice per endpoint, and both
//! endpoints are the same node), or three times without
//! `include_self_twice`. Adjacency traversals that report a loop once per
//! node would count it only twice. Non-loop edges are unaffected.
//!
//! ## Building
//!
//! ```rust,ignore
//! let mut builder = GraphBuilder::new();
//! builder.add_node("1");
//! builder.add_node("2");
//! builder.add_edge("1", "2");
//! let graph = builder.build()?;
//! assert_eq!(graph.edge_count(), 1);
//! ```

use std::collections::HashMap;

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use tracing::{debug, instrument};

use crate::error::IntegrityError;

/// Dense edge identifier in `[0, |E|)`.
pub type EdgeId = usize;

/// Node handle inside a [`GraphStore`].
pub type NodeId = NodeIndex;

/// One entry of a node's incidence list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Incident {
    /// The node at the other end of the edge.
    pub neighbor: NodeId,
    /// The connecting edge.
    pub edge: EdgeId,
}

// ---------------------------------------------------------------------------
// GraphStore
// ---------------------------------------------------------------------------

/// Read-only graph topology for a propagation run.
#[derive(Debug, Clone)]
pub struct GraphStore {
    graph: UnGraph<String, ()>,
    node_map: HashMap<String, NodeId>,
    offsets: Vec<usize>,
    incidence: Vec<Incident>,
    content_hash: String,
}

impl GraphStore {
    /// Build a store from an edge list, declaring nodes in first-appearance
    /// order. Edge ids follow slice order.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`GraphBuilder::build`].
    pub fn from_edges(edges: &[(&str, &str)]) -> Result<Self, IntegrityError> {
        let mut builder = GraphBuilder::new();
        for (u, v) in edges {
            builder.add_node(u);
            builder.add_node(v);
            builder.add_edge(u, v);
        }
        builder.build()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node handles.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = NodeId> + '_ {
        self.graph.node_indices()
    }

    /// All edge ids in ascending order.
    pub fn edges(&self) -> std::ops::Range<EdgeId> {
        0..self.edge_count()
    }

    /// Edges incident to `node`, ordered by edge id.
    ///
    /// Returns an empty slice for a handle that does not belong to this graph.
    #[must_use]
    pub fn neighbors(&self, node: NodeId) -> &[Incident] {
        let idx = node.index();
        if idx + 1 >= self.offsets.len() {
            return &[];
        }
        &self.incidence[self.offsets[idx]..self.offsets[idx + 1]]
    }

    /// Endpoints `(u, v)` of an edge, in the orientation it was declared.
    #[must_use]
    pub fn endpoints(&self, edge: EdgeId) -> Option<(NodeId, NodeId)> {
        self.graph.edge_endpoints(EdgeIndex::new(edge))
    }

    /// Number of incidence entries at `node` (self-loops count twice).
    #[must_use]
    pub fn degree(&self, node: NodeId) -> usize {
        self.neighbors(node).len()
    }

    /// The upstream key of a node.
    #[must_use]
    pub fn node_key(&self, node: NodeId) -> Option<&str> {
        self.graph.node_weight(node).map(String::as_str)
    }

    /// Look up a node handle by its upstream key.
    #[must_use]
    pub fn node_index(&self, key: &str) -> Option<NodeId> {
        self.node_map.get(key).copied()
    }

    /// Upstream keys of both endpoints of an edge.
    #[must_use]
    pub fn endpoint_keys(&self, edge: EdgeId) -> Option<(&str, &str)> {
        let (u, v) = self.endpoints(edge)?;
        Some((self.node_key(u)?, self.node_key(v)?))
    }

    /// Number of edges whose endpoints coincide.
    #[must_use]
    pub fn self_loop_count(&self) -> usize {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .filter(|(u, v)| u == v)
            .count()
    }

    /// BLAKE3 hash of the keyed edge list, in edge-id order.
    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PendingEdge {
    id: Option<EdgeId>,
    u: String,
    v: String,
}

/// Accumulates nodes and edges, then validates and indexes them.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: UnGraph<String, ()>,
    node_map: HashMap<String, NodeId>,
    pending: Vec<PendingEdge>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: UnGraph::with_capacity(nodes, edges),
            node_map: HashMap::with_capacity(nodes),
            pending: Vec::with_capacity(edges),
        }
    }

    /// Declare a node. Declaring an existing key returns its handle.
    pub fn add_node(&mut self, key: &str) -> NodeId {
        if let Some(&idx) = self.node_map.get(key) {
            return idx;
        }
        let idx = self.graph.add_node(key.to_string());
        self.node_map.insert(key.to_string(), idx);
        idx
    }

    /// Queue an edge; its id is its position among queued edges.
    pub fn add_edge(&mut self, u: &str, v: &str) {
        self.pending.push(PendingEdge {
            id: None,
            u: u.to_string(),
            v: v.to_string(),
        });
    }

    /// Queue an edge with an explicit id.
    pub fn add_edge_with_id(&mut self, id: EdgeId, u: &str, v: &str) {
        self.pending.push(PendingEdge {
            id: Some(id),
            u: u.to_string(),
            v: v.to_string(),
        });
    }

    /// Validate the queued edges, assign edge ids and build the incidence
    /// index.
    ///
    /// # Errors
    ///
    /// Returns an [`IntegrityError`] when an endpoint was never declared, or
    /// when explicit ids are mixed with implicit ones, out of range, or
    /// repeated.
    #[instrument(skip(self), fields(nodes = self.graph.node_count(), edges = self.pending.len()))]
    pub fn build(self) -> Result<GraphStore, IntegrityError> {
        let Self {
            mut graph,
            node_map,
            pending,
        } = self;

        let order = edge_order(&pending)?;

        let mut hasher = blake3::Hasher::new();
        for &pos in &order {
            let edge = &pending[pos];
            let u = *node_map
                .get(&edge.u)
                .ok_or_else(|| IntegrityError::UnknownNode {
                    edge: edge.id.unwrap_or(pos),
                    node: edge.u.clone(),
                })?;
            let v = *node_map
                .get(&edge.v)
                .ok_or_else(|| IntegrityError::UnknownNode {
                    edge: edge.id.unwrap_or(pos),
                    node: edge.v.clone(),
                })?;
            graph.add_edge(u, v, ());

            hasher.update(edge.u.as_bytes());
            hasher.update(b"\t");
            hasher.update(edge.v.as_bytes());
            hasher.update(b"\n");
        }

        let (offsets, incidence) = build_incidence(&graph);
        let content_hash = format!("blake3:{}", hasher.finalize().to_hex());

        debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "graph indexed"
        );

        Ok(GraphStore {
            graph,
            node_map,
            offsets,
            incidence,
            content_hash,
        })
    }
}

/// Positions into `pending`, listed in final edge-id order.
fn edge_order(pending: &[PendingEdge]) -> Result<Vec<usize>, IntegrityError> {
    let explicit = pending.iter().filter(|e| e.id.is_some()).count();
    if explicit == 0 {
        return Ok((0..pending.len()).collect());
    }
    if explicit != pending.len() {
        return Err(IntegrityError::MixedEdgeIds);
    }

    let edge_count = pending.len();
    let mut slots: Vec<Option<usize>> = vec![None; edge_count];
    for (pos, edge) in pending.iter().enumerate() {
        let id = edge.id.unwrap_or(pos);
        let slot = slots
            .get_mut(id)
            .ok_or(IntegrityError::EdgeIdOutOfRange { id, edge_count })?;
        if slot.is_some() {
            return Err(IntegrityError::DuplicateEdgeId(id));
        }
        *slot = Some(pos);
    }

    // With |E| in-range, distinct ids every slot is filled.
    Ok(slots.into_iter().flatten().collect())
}

fn build_incidence(graph: &UnGraph<String, ()>) -> (Vec<usize>, Vec<Incident>) {
    let n = graph.node_count();
    let mut degree = vec![0usize; n];
    for e in graph.edge_indices() {
        if let Some((u, v)) = graph.edge_endpoints(e) {
            degree[u.index()] += 1;
            degree[v.index()] += 1;
        }
    }

    let mut offsets = Vec::with_capacity(n + 1);
    let mut total = 0;
    offsets.push(0);
    for d in &degree {
        total += d;
        offsets.push(total);
    }

    let placeholder = Incident {
        neighbor: NodeIndex::new(0),
        edge: 0,
    };
    let mut incidence = vec![placeholder; total];
    let mut cursor: Vec<usize> = offsets[..n].to_vec();
    for e in graph.edge_indices() {
        if let Some((u, v)) = graph.edge_endpoints(e) {
            incidence[cursor[u.index()]] = Incident {
                neighbor: v,
                edge: e.index(),
            };
            cursor[u.index()] += 1;
            incidence[cursor[v.index()]] = Incident {
                neighbor: u,
                edge: e.index(),
            };
            cursor[v.index()] += 1;
        }
    }

    (offsets, incidence)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> GraphStore {
        GraphStore::from_edges(&[("1", "2"), ("2", "3"), ("3", "1")]).expect("valid triangle")
    }

    #[test]
    fn edge_ids_are_dense_and_ordered() {
        let g = triangle();
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.edges().collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(g.endpoint_keys(1), Some(("2", "3")));
        assert_eq!(g.endpoints(3), None);
    }

    #[test]
    fn every_edge_is_incident_to_both_endpoints() {
        let g = triangle();
        let n2 = g.node_index("2").expect("node 2");
        let edges: Vec<EdgeId> = g.neighbors(n2).iter().map(|i| i.edge).collect();
        assert_eq!(edges, vec![0, 1]);

        let neighbors: Vec<&str> = g
            .neighbors(n2)
            .iter()
            .filter_map(|i| g.node_key(i.neighbor))
            .collect();
        assert_eq!(neighbors, vec!["1", "3"]);
    }

    #[test]
    fn isolated_node_has_no_incidence() {
        let mut b = GraphBuilder::new();
        b.add_node("a");
        b.add_node("b");
        b.add_node("lonely");
        b.add_edge("a", "b");
        let g = b.build().expect("valid");
        let lonely = g.node_index("lonely").expect("declared");
        assert!(g.neighbors(lonely).is_empty());
        assert_eq!(g.degree(lonely), 0);
    }

    #[test]
    fn self_loop_appears_twice_at_its_node() {
        let g = GraphStore::from_edges(&[("a", "a"), ("a", "b")]).expect("valid");
        let a = g.node_index("a").expect("a");
        let edges: Vec<EdgeId> = g.neighbors(a).iter().map(|i| i.edge).collect();
        assert_eq!(edges, vec![0, 0, 1]);
        assert_eq!(g.self_loop_count(), 1);
    }

    #[test]
    fn unknown_endpoint_is_rejected() {
        let mut b = GraphBuilder::new();
        b.add_node("a");
        b.add_edge("a", "ghost");
        let err = b.build().expect_err("ghost is not declared");
        assert_eq!(
            err,
            IntegrityError::UnknownNode {
                edge: 0,
                node: "ghost".to_string()
            }
        );
    }

    #[test]
    fn explicit_ids_reorder_edges() {
        let mut b = GraphBuilder::new();
        for key in ["a", "b", "c"] {
            b.add_node(key);
        }
        b.add_edge_with_id(1, "a", "b");
        b.add_edge_with_id(0, "b", "c");
        let g = b.build().expect("valid permutation");
        assert_eq!(g.endpoint_keys(0), Some(("b", "c")));
        assert_eq!(g.endpoint_keys(1), Some(("a", "b")));
    }

    #[test]
    fn non_bijective_ids_are_rejected() {
        let mut dup = GraphBuilder::new();
        dup.add_node("a");
        dup.add_node("b");
        dup.add_edge_with_id(0, "a", "b");
        dup.add_edge_with_id(0, "b", "a");
        assert_eq!(
            dup.build().expect_err("duplicate"),
            IntegrityError::DuplicateEdgeId(0)
        );

        let mut gap = GraphBuilder::new();
        gap.add_node("a");
        gap.add_node("b");
        gap.add_edge_with_id(0, "a", "b");
        gap.add_edge_with_id(2, "b", "a");
        assert_eq!(
            gap.build().expect_err("gap"),
            IntegrityError::EdgeIdOutOfRange {
                id: 2,
                edge_count: 2
            }
        );

        let mut mixed = GraphBuilder::new();
        mixed.add_node("a");
        mixed.add_node("b");
        mixed.add_edge_with_id(0, "a", "b");
        mixed.add_edge("b", "a");
        assert_eq!(
            mixed.build().expect_err("mixed"),
            IntegrityError::MixedEdgeIds
        );
    }

    #[test]
    fn content_hash_tracks_edge_order() {
        let a = GraphStore::from_edges(&[("1", "2"), ("2", "3")]).expect("valid");
        let b = GraphStore::from_edges(&[("1", "2"), ("2", "3")]).expect("valid");
        let c = GraphStore::from_edges(&[("2", "3"), ("1", "2")]).expect("valid");
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
        assert!(a.content_hash().starts_with("blake3:"));
    }
}
