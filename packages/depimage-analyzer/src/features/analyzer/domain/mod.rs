//! Analysis Result Table (C6): node identity → current SSV during a pass.
//!
//! Append-only within a pass; handed to the caller as an immutable
//! snapshot when the pass completes. Grounded on the plain `HashMap`
//! result maps `worklist_solver.rs`'s fixpoint loops build up and return.

use crate::features::depgraph::NodeId;
use crate::features::ssv::Ssv;
use rustc_hash::FxHashMap;

/// Per-phase wall-clock timings for one analyzer invocation (design note
/// §9: "global performance counters... implement as an injected collector
/// passed to C5, not as ambient state"). Grounded on `PipelineResult`'s
/// `merge_metrics(&StageMetrics)`: each phase records its own elapsed time
/// into a caller-owned value rather than a global counter; the caller
/// decides whether to log, aggregate across files, or discard it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseMetrics {
    pub forward_ms: u64,
    pub backward_ms: u64,
    pub validation_patch_ms: u64,
    pub sanitization_diff_ms: u64,
}

impl PhaseMetrics {
    pub fn merge(&mut self, other: &PhaseMetrics) {
        self.forward_ms += other.forward_ms;
        self.backward_ms += other.backward_ms;
        self.validation_patch_ms += other.validation_patch_ms;
        self.sanitization_diff_ms += other.sanitization_diff_ms;
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisResultTable {
    values: FxHashMap<NodeId, Ssv>,
}

impl AnalysisResultTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<&Ssv> {
        self.values.get(&id)
    }

    /// Inserts or overwrites the value for `id`. Overwriting is expected
    /// during Kleene iteration inside an SCC; outside an SCC each node is
    /// visited exactly once in topological order.
    pub fn set(&mut self, id: NodeId, value: Ssv) {
        self.values.insert(id, value);
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.values.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::automaton::dfa::Dfa;
    use petgraph::graph::NodeIndex;

    #[test]
    fn set_then_get_round_trips() {
        let mut table = AnalysisResultTable::new();
        let id = NodeIndex::new(0);
        table.set(id, Ssv::new(Dfa::any_string()));
        assert!(table.get(id).unwrap().equals(&Ssv::new(Dfa::any_string())));
    }

    #[test]
    fn unknown_node_is_absent() {
        let table = AnalysisResultTable::new();
        assert!(table.get(NodeIndex::new(7)).is_none());
    }
}
