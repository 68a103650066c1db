//! DepGraph Model (C3): nodes are input / literal / operation / sink,
//! edges carry the semantically-significant child order.
//!
//! Grounded on `DependencyGraph` (petgraph `DiGraph` + Tarjan SCC +
//! Kahn's-algorithm topological order), generalized from a file-level
//! dependency graph to a string-operation expression graph.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rustc_hash::{FxHashMap, FxHashSet};

pub type NodeId = NodeIndex;

/// The closed set of node kinds a DepGraph can contain (§3, §9 "avoid
/// inheritance hierarchies; the node kind space is closed").
#[derive(Debug, Clone)]
pub enum Node {
    /// Named external taint source.
    Input { name: String },
    /// A fixed string constant.
    Literal { value: Vec<u8> },
    /// Names a registered operation; children are ordered edges out of
    /// this node (edge weight is the child index).
    Operation { op: String },
    /// At most one per analyzed sub-graph; has exactly one child (the
    /// expression whose value reaches the sink).
    Sink,
}

impl Node {
    pub fn input_name(&self) -> Option<&str> {
        match self {
            Node::Input { name } => Some(name),
            _ => None,
        }
    }
}

/// A directed graph of [`Node`]s; edge weight is the child's position in
/// its parent's ordered argument list.
#[derive(Debug, Clone, Default)]
pub struct DepGraph {
    graph: DiGraph<Node, usize>,
    by_input_name: FxHashMap<String, NodeId>,
}

impl DepGraph {
    pub fn new() -> Self {
        DepGraph {
            graph: DiGraph::new(),
            by_input_name: FxHashMap::default(),
        }
    }

    pub fn add_node(&mut self, node: Node) -> NodeId {
        if let Node::Input { name } = &node {
            let name = name.clone();
            let id = self.graph.add_node(node);
            self.by_input_name.insert(name, id);
            id
        } else {
            self.graph.add_node(node)
        }
    }

    /// Connects `parent`'s `child_index`-th argument to `child`.
    pub fn add_child(&mut self, parent: NodeId, child_index: usize, child: NodeId) {
        self.graph.add_edge(parent, child, child_index);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.graph[id]
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Children of `id` in argument order (edge weight is the index).
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let mut edges: Vec<(usize, NodeId)> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (*e.weight(), e.target()))
            .collect();
        edges.sort_by_key(|(idx, _)| *idx);
        edges.into_iter().map(|(_, t)| t).collect()
    }

    pub fn find_input(&self, name: &str) -> Option<NodeId> {
        self.by_input_name.get(name).copied()
    }

    /// Inputs with no upstream definition — i.e. every input node, since
    /// inputs are by definition leaves with no incoming edges required.
    pub fn uninit_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&id| matches!(self.graph[id], Node::Input { .. }))
            .collect()
    }

    /// The sub-graph that transitively reaches or is reached by `id`,
    /// preserving child order and edge multiplicity.
    pub fn project_on_input(&self, id: NodeId) -> DepGraph {
        let mut keep: FxHashSet<NodeId> = FxHashSet::default();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if !keep.insert(n) {
                continue;
            }
            for e in self.graph.edges_directed(n, Direction::Outgoing) {
                stack.push(e.target());
            }
            for e in self.graph.edges_directed(n, Direction::Incoming) {
                stack.push(e.source());
            }
        }

        let mut out = DepGraph::new();
        let mut remap: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for &old in &keep {
            let new = out.add_node(self.graph[old].clone());
            remap.insert(old, new);
        }
        for old in &keep {
            for e in self.graph.edges_directed(*old, Direction::Outgoing) {
                if keep.contains(&e.target()) {
                    out.add_child(remap[old], *e.weight(), remap[&e.target()]);
                }
            }
        }
        out
    }

    pub fn raw(&self) -> &DiGraph<Node, usize> {
        &self.graph
    }

    /// The distinguished sink node, if one is present (§3: "at most one
    /// distinguished root per analyzed sub-graph").
    pub fn find_sink(&self) -> Option<NodeId> {
        self.graph.node_indices().find(|&id| matches!(self.graph[id], Node::Sink))
    }
}
