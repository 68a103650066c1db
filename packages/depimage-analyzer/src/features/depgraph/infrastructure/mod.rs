//! Acyclic condensation and topological ordering over a [`DepGraph`],
//! plus the DOT parser adapter.
//!
//! Grounded on `DependencyGraph`'s `tarjan_scc` + Kahn's-algorithm
//! topological order (`dep_graph.rs`), generalized to also record the
//! back-edge set a condensed node needs for widening (§4.3, §9: "Cyclic
//! DepGraphs must become an acyclic condensation + back-edge set").

pub mod parser;

use super::domain::{DepGraph, NodeId};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

pub type SccId = NodeIndex;

/// One representative per SCC of the original graph, with the original
/// member node ids (in Tarjan's emission order) and the set of
/// intra-SCC "back edges" collapsed into this representative.
#[derive(Debug, Clone)]
pub struct SccNode {
    pub members: Vec<NodeId>,
    pub is_cyclic: bool,
}

/// The acyclic condensation of a [`DepGraph`]: nodes are SCCs
/// (singletons for acyclic parts), edges point from a representative to
/// every representative one of its members has an outgoing edge to.
#[derive(Debug, Clone)]
pub struct AcyclicGraph {
    graph: DiGraph<SccNode, usize>,
    member_to_scc: FxHashMap<NodeId, SccId>,
}

impl AcyclicGraph {
    pub fn scc(&self, id: SccId) -> &SccNode {
        &self.graph[id]
    }

    pub fn scc_of(&self, member: NodeId) -> SccId {
        self.member_to_scc[&member]
    }

    pub fn children(&self, id: SccId) -> Vec<SccId> {
        let mut edges: Vec<(usize, SccId)> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(idx, _)| *idx);
        edges.into_iter().map(|(_, t)| t).collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}

/// Tarjan SCCs, one node per SCC, back-edge set attached via
/// [`SccNode::is_cyclic`]. Edge multiplicity and order from the source
/// graph are preserved on the condensed edges via the minimum child
/// index observed across collapsed parallel edges.
pub fn condense(dep_graph: &DepGraph) -> AcyclicGraph {
    let raw = dep_graph.raw();
    let sccs = tarjan_scc(raw);

    let mut graph: DiGraph<SccNode, usize> = DiGraph::new();
    let mut member_to_scc: FxHashMap<NodeId, SccId> = FxHashMap::default();

    for members in &sccs {
        let is_cyclic = members.len() > 1
            || members
                .first()
                .is_some_and(|&m| raw.edges_directed(m, Direction::Outgoing).any(|e| e.target() == m));
        let scc_id = graph.add_node(SccNode {
            members: members.clone(),
            is_cyclic,
        });
        for &m in members {
            member_to_scc.insert(m, scc_id);
        }
    }

    let mut edge_weight: FxHashMap<(SccId, SccId), usize> = FxHashMap::default();
    for e in raw.edge_references() {
        let from = member_to_scc[&e.source()];
        let to = member_to_scc[&e.target()];
        if from == to {
            continue;
        }
        edge_weight
            .entry((from, to))
            .and_modify(|w| *w = (*w).min(*e.weight()))
            .or_insert(*e.weight());
    }
    for ((from, to), weight) in edge_weight {
        graph.add_edge(from, to, weight);
    }

    AcyclicGraph { graph, member_to_scc }
}

/// Leaves first, stable tie-breaker on node id (Kahn's algorithm, per
/// `DependencyGraph::compute_topological_order`).
pub fn topological_order(acyclic: &AcyclicGraph) -> Vec<SccId> {
    // Leaves (no outgoing edges, i.e. no children) come first in this
    // analyzer's bottom-up evaluation order, so we run Kahn's algorithm
    // on the *reversed* dependency relation.
    let mut ready: Vec<SccId> = acyclic
        .graph
        .node_indices()
        .filter(|&id| acyclic.graph.edges_directed(id, Direction::Outgoing).count() == 0)
        .collect();
    ready.sort_by_key(|id| id.index());
    let mut queue: VecDeque<SccId> = ready.into();

    let mut remaining_out: FxHashMap<SccId, usize> = FxHashMap::default();
    for id in acyclic.graph.node_indices() {
        remaining_out.insert(id, acyclic.graph.edges_directed(id, Direction::Outgoing).count());
    }

    let mut order = Vec::with_capacity(acyclic.node_count());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        let mut newly_ready = Vec::new();
        for e in acyclic.graph.edges_directed(id, Direction::Incoming) {
            let parent = e.source();
            let rem = remaining_out.get_mut(&parent).unwrap();
            *rem -= 1;
            if *rem == 0 {
                newly_ready.push(parent);
            }
        }
        newly_ready.sort_by_key(|id| id.index());
        queue.extend(newly_ready);
    }
    order
}
