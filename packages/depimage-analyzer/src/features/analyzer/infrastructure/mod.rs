//! Fixpoint Analyzer (C5): forward image, backward image, validation-patch
//! extraction, and sanitization-diff check, each a distinct entry point
//! over the acyclic condensation from `features::depgraph`.
//!
//! Grounded on the teacher's worklist-style solvers (`worklist_solver.rs`):
//! a fixed topological visit order, a per-node transfer function dispatched
//! through a registry, and bounded iteration at cycle entries. The four
//! modes mirror `ForwardImageComputer`'s `computeFwImage`/`doNodeComputation`
//! split and the `doBackwardAnalysis` / `doBackwardAnalysis_ValidationPhase`
//! distinction confirmed in the original source.
//!
//! Each entry point takes a `&mut PhaseMetrics` and records its own elapsed
//! time into it (§9: timing is an injected collector, not ambient state),
//! mirroring `PipelineResult::merge_metrics` folding a `StageMetrics` value
//! into a caller-owned total rather than a global counter.

use super::domain::{AnalysisResultTable, PhaseMetrics};
use crate::config::AnalyzerConfig;
use crate::errors::{EngineError, EngineResult};
use crate::features::depgraph::{condense, topological_order, AcyclicGraph, DepGraph, Node, NodeId, SccId};
use crate::features::registry;
use crate::features::ssv::{Ssv, SsvEngine};
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Instant;
use tracing::{debug, warn};

/// Initial values fed to uninitialized (input) nodes at the start of a
/// forward pass: a default for every input not named explicitly, plus
/// named overrides (used to seed a validation patch into one input for
/// the sanitization-diff check).
#[derive(Debug, Clone)]
pub struct ForwardSeed {
    pub default_uninit: Ssv,
    pub overrides: FxHashMap<String, Ssv>,
}

impl ForwardSeed {
    pub fn any_string(engine: &SsvEngine) -> Self {
        ForwardSeed {
            default_uninit: engine.any_string(),
            overrides: FxHashMap::default(),
        }
    }

    pub fn with_override(mut self, input_name: impl Into<String>, value: Ssv) -> Self {
        self.overrides.insert(input_name.into(), value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct SanitizationDiff {
    pub patcher_post: Ssv,
    pub patchee_post: Ssv,
    pub added: Ssv,
    pub removed: Ssv,
}

impl SanitizationDiff {
    pub fn diverges(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

pub struct Analyzer {
    engine: SsvEngine,
}

impl Analyzer {
    pub fn new(engine: SsvEngine) -> Self {
        Analyzer { engine }
    }

    pub fn engine(&self) -> &SsvEngine {
        &self.engine
    }

    // ---- mode 1: forward image ------------------------------------------

    /// Evaluates every node in topological order, returns the full result
    /// table plus the sink's post-image. `metrics` is an injected collector
    /// (§9): this call records its own wall-clock time into it rather than
    /// touching any global counter.
    pub fn forward(
        &self,
        graph: &DepGraph,
        seed: &ForwardSeed,
        config: &AnalyzerConfig,
        metrics: &mut PhaseMetrics,
    ) -> EngineResult<(AnalysisResultTable, Ssv)> {
        let started = Instant::now();
        let acyclic = condense(graph);
        let order = topological_order(&acyclic);
        let mut table = AnalysisResultTable::new();

        for scc_id in &order {
            self.evaluate_scc_forward(graph, &acyclic, *scc_id, seed, config, &mut table)?;
        }

        let sink = graph
            .find_sink()
            .ok_or_else(|| EngineError::internal("DepGraph has no sink node"))?;
        let post_image = table
            .get(sink)
            .cloned()
            .ok_or_else(|| EngineError::internal("sink was not assigned a value by the forward pass"))?;
        metrics.forward_ms += started.elapsed().as_millis() as u64;
        Ok((table, post_image))
    }

    fn evaluate_scc_forward(
        &self,
        graph: &DepGraph,
        acyclic: &AcyclicGraph,
        scc_id: SccId,
        seed: &ForwardSeed,
        config: &AnalyzerConfig,
        table: &mut AnalysisResultTable,
    ) -> EngineResult<()> {
        let scc = acyclic.scc(scc_id);
        if !scc.is_cyclic {
            let member = scc.members[0];
            let value = self.compute_node_forward(graph, table, member, seed)?;
            table.set(member, value);
            return Ok(());
        }

        let mut members = scc.members.clone();
        members.sort_by_key(|m| m.index());
        for &m in &members {
            table.set(m, self.engine.empty());
        }

        let mut reached_fixpoint = false;
        for iteration in 0..config.iteration_bound {
            let before: Vec<Ssv> = members.iter().map(|&m| table.get(m).cloned().unwrap()).collect();
            for &m in &members {
                let value = self.compute_node_forward(graph, table, m, seed)?;
                table.set(m, value);
            }
            let stable = members
                .iter()
                .zip(before.iter())
                .all(|(&m, old)| table.get(m).unwrap().equals(old));
            if stable {
                debug!(iterations = iteration + 1, "SCC reached forward fixpoint");
                reached_fixpoint = true;
                break;
            }
        }

        if !reached_fixpoint {
            warn!(
                bound = config.iteration_bound,
                "SCC did not converge within the iteration bound; widening"
            );
            let widened = self.widen(graph, &members)?;
            for &m in &members {
                let current = table.get(m).cloned().unwrap();
                table.set(m, self.engine.union(&current, &widened)?);
            }
        }
        Ok(())
    }

    fn compute_node_forward(
        &self,
        graph: &DepGraph,
        table: &AnalysisResultTable,
        id: NodeId,
        seed: &ForwardSeed,
    ) -> EngineResult<Ssv> {
        match graph.node(id) {
            Node::Input { name } => Ok(seed
                .overrides
                .get(name.as_str())
                .cloned()
                .unwrap_or_else(|| seed.default_uninit.clone())),
            Node::Literal { value } => Ok(self.engine.of_literal(value)?),
            Node::Sink => {
                let children = graph.children(id);
                match children.first() {
                    Some(&c) => child_value(table, c),
                    None => Ok(self.engine.epsilon()),
                }
            }
            Node::Operation { op } => {
                let descriptor = registry::lookup(op).ok_or_else(|| EngineError::UnsupportedOp(op.clone()))?;
                let children = graph.children(id);
                if children.len() != descriptor.arity {
                    return Err(EngineError::ArityMismatch {
                        op: op.clone(),
                        expected: descriptor.arity,
                        actual: children.len(),
                    });
                }
                let child_values = children
                    .iter()
                    .map(|&c| child_value(table, c))
                    .collect::<EngineResult<Vec<_>>>()?;
                (descriptor.fwd)(&self.engine, &child_values)
            }
        }
    }

    /// Alphabet-restricted widening (resolved Open Question, §9): union the
    /// current value with `Σ_reachable*`, the star over every byte that
    /// appears in a literal feeding this SCC; falls back to full `Σ*` when
    /// no literal is reachable, preserving more precision than an
    /// unconditional `any_string()` widen whenever the graph contains at
    /// least one literal.
    fn widen(&self, graph: &DepGraph, members: &[NodeId]) -> EngineResult<Ssv> {
        let alphabet = reachable_literal_alphabet(graph, members);
        if alphabet.is_empty() {
            return Ok(self.engine.any_string());
        }
        let pattern = alphabet_star_pattern(&alphabet);
        Ok(self.engine.of_regex(&pattern)?)
    }

    // ---- mode 2: backward image ------------------------------------------

    /// Propagates `sink_constraint` backward through the graph, using
    /// `forward_table` to supply each operation's sibling forward values
    /// to `bwd`. Returns the per-node constraint table; pre-images live at
    /// the input nodes.
    pub fn backward(
        &self,
        graph: &DepGraph,
        forward_table: &AnalysisResultTable,
        sink_constraint: Ssv,
        config: &AnalyzerConfig,
        metrics: &mut PhaseMetrics,
    ) -> EngineResult<AnalysisResultTable> {
        let started = Instant::now();
        let acyclic = condense(graph);
        let order = topological_order(&acyclic);
        let mut table = AnalysisResultTable::new();

        let sink = graph
            .find_sink()
            .ok_or_else(|| EngineError::internal("DepGraph has no sink node"))?;
        table.set(sink, sink_constraint);

        for scc_id in order.iter().rev() {
            self.evaluate_scc_backward(graph, &acyclic, *scc_id, forward_table, config, &mut table)?;
        }
        metrics.backward_ms += started.elapsed().as_millis() as u64;
        Ok(table)
    }

    fn evaluate_scc_backward(
        &self,
        graph: &DepGraph,
        acyclic: &AcyclicGraph,
        scc_id: SccId,
        forward_table: &AnalysisResultTable,
        config: &AnalyzerConfig,
        table: &mut AnalysisResultTable,
    ) -> EngineResult<()> {
        let scc = acyclic.scc(scc_id);
        if !scc.is_cyclic {
            let member = scc.members[0];
            self.propagate_node_backward(graph, forward_table, member, table)?;
            return Ok(());
        }

        let mut members = scc.members.clone();
        members.sort_by_key(|m| m.index());

        let mut reached_fixpoint = false;
        for iteration in 0..config.iteration_bound {
            let before: Vec<Option<Ssv>> = members.iter().map(|&m| table.get(m).cloned()).collect();
            for &m in members.iter().rev() {
                self.propagate_node_backward(graph, forward_table, m, table)?;
            }
            let stable = members.iter().zip(before.iter()).all(|(&m, old)| match (table.get(m), old) {
                (Some(cur), Some(old)) => cur.equals(old),
                (None, None) => true,
                _ => false,
            });
            if stable {
                debug!(iterations = iteration + 1, "SCC reached backward fixpoint");
                reached_fixpoint = true;
                break;
            }
        }

        if !reached_fixpoint {
            warn!(
                bound = config.iteration_bound,
                "backward SCC did not converge within the iteration bound; widening"
            );
            let widened = self.widen(graph, &members)?;
            for &m in &members {
                if let Some(current) = table.get(m).cloned() {
                    table.set(m, self.engine.union(&current, &widened)?);
                }
            }
        }
        Ok(())
    }

    fn propagate_node_backward(
        &self,
        graph: &DepGraph,
        forward_table: &AnalysisResultTable,
        id: NodeId,
        table: &mut AnalysisResultTable,
    ) -> EngineResult<()> {
        let parent_constraint = match table.get(id) {
            Some(v) => v.clone(),
            // Not (yet) reached from the sink on this pass: nothing to push.
            None => return Ok(()),
        };

        match graph.node(id) {
            Node::Input { .. } | Node::Literal { .. } => Ok(()),
            Node::Sink => {
                if let Some(&child) = graph.children(id).first() {
                    self.intersect_into(table, child, parent_constraint)?;
                }
                Ok(())
            }
            Node::Operation { op } => {
                let descriptor = registry::lookup(op).ok_or_else(|| EngineError::UnsupportedOp(op.clone()))?;
                let children = graph.children(id);
                if children.len() != descriptor.arity {
                    return Err(EngineError::ArityMismatch {
                        op: op.clone(),
                        expected: descriptor.arity,
                        actual: children.len(),
                    });
                }
                let forward_children = children
                    .iter()
                    .map(|&c| {
                        forward_table
                            .get(c)
                            .cloned()
                            .unwrap_or_else(|| self.engine.any_string())
                    })
                    .collect::<Vec<_>>();
                for (idx, &child_id) in children.iter().enumerate() {
                    let new_constraint = (descriptor.bwd)(&self.engine, &parent_constraint, &forward_children, idx)?;
                    self.intersect_into(table, child_id, new_constraint)?;
                }
                Ok(())
            }
        }
    }

    fn intersect_into(&self, table: &mut AnalysisResultTable, id: NodeId, value: Ssv) -> EngineResult<()> {
        let merged = match table.get(id) {
            Some(existing) => self.engine.intersect(existing, &value)?,
            None => value,
        };
        table.set(id, merged);
        Ok(())
    }

    // ---- mode 3: validation-patch extraction ------------------------------

    /// A specialized backward pass seeded with `empty()` at the sink: the
    /// result at each input is the language the program's existing
    /// validation currently *accepts*. The negative validation patch is
    /// that language's complement — inputs currently let through that
    /// should be blocked.
    ///
    /// Per §9's resolved design note, this builds an entirely fresh table
    /// and never mutates the forward pass's own table.
    pub fn validation_patch(
        &self,
        graph: &DepGraph,
        config: &AnalyzerConfig,
        metrics: &mut PhaseMetrics,
    ) -> EngineResult<FxHashMap<String, Ssv>> {
        let started = Instant::now();
        let seed = ForwardSeed::any_string(&self.engine);
        let (forward_table, _post_image) = self.forward(graph, &seed, config, metrics)?;
        let back_table = self.backward(graph, &forward_table, self.engine.empty(), config, metrics)?;

        let mut patches = FxHashMap::default();
        for id in graph.uninit_nodes() {
            let name = graph
                .node(id)
                .input_name()
                .expect("uninit_nodes only returns Input nodes")
                .to_string();
            let accepted = back_table.get(id).cloned().unwrap_or_else(|| self.engine.empty());
            patches.insert(name, self.engine.complement(&accepted)?);
        }
        metrics.validation_patch_ms += started.elapsed().as_millis() as u64;
        Ok(patches)
    }

    // ---- mode 4: sanitization-diff check -----------------------------------

    /// Two forward passes over `patcher` (the existing sanitizer) and
    /// `patchee` (the candidate replacement), with `patchee`'s
    /// `relevant_input` seeded with the validation patch computed against
    /// `patcher` (§9 resolved Open Question): the patcher's other uninit
    /// inputs default to `any_string()`, the patchee's other uninit inputs
    /// default to `epsilon()`.
    pub fn sanitization_diff(
        &self,
        patcher: &DepGraph,
        patchee: &DepGraph,
        relevant_input: &str,
        config: &AnalyzerConfig,
        metrics: &mut PhaseMetrics,
    ) -> EngineResult<SanitizationDiff> {
        let started = Instant::now();
        let patches = self.validation_patch(patcher, config, metrics)?;
        let patch_for_input = patches.get(relevant_input).cloned().unwrap_or_else(|| self.engine.any_string());

        let patcher_seed = ForwardSeed::any_string(&self.engine);
        let (_, patcher_post) = self.forward(patcher, &patcher_seed, config, metrics)?;

        let patchee_seed = ForwardSeed {
            default_uninit: self.engine.epsilon(),
            overrides: FxHashMap::default(),
        }
        .with_override(relevant_input, patch_for_input);
        let (_, patchee_post) = self.forward(patchee, &patchee_seed, config, metrics)?;

        let added = self.engine.intersect(&patchee_post, &self.engine.complement(&patcher_post)?)?;
        let removed = self.engine.intersect(&patcher_post, &self.engine.complement(&patchee_post)?)?;

        metrics.sanitization_diff_ms += started.elapsed().as_millis() as u64;
        Ok(SanitizationDiff {
            patcher_post,
            patchee_post,
            added,
            removed,
        })
    }
}

fn child_value(table: &AnalysisResultTable, id: NodeId) -> EngineResult<Ssv> {
    table
        .get(id)
        .cloned()
        .ok_or_else(|| EngineError::internal("child node evaluated out of topological order"))
}

/// Collects every byte appearing in a literal transitively reachable
/// (downward, through child edges) from any of `members`.
fn reachable_literal_alphabet(graph: &DepGraph, members: &[NodeId]) -> Vec<u8> {
    let mut seen: FxHashSet<NodeId> = FxHashSet::default();
    let mut stack: Vec<NodeId> = members.to_vec();
    let mut bytes: FxHashSet<u8> = FxHashSet::default();

    while let Some(n) = stack.pop() {
        if !seen.insert(n) {
            continue;
        }
        if let Node::Literal { value } = graph.node(n) {
            bytes.extend(value.iter().copied());
        }
        stack.extend(graph.children(n));
    }

    let mut out: Vec<u8> = bytes.into_iter().collect();
    out.sort_unstable();
    out
}

fn alphabet_star_pattern(bytes: &[u8]) -> String {
    let mut pattern = String::from("[");
    for &b in bytes {
        pattern.push_str(&format!("\\x{b:02x}"));
    }
    pattern.push_str("]*");
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::catalogue::Context;
    use crate::features::depgraph::{DepGraph, Node};

    fn config() -> AnalyzerConfig {
        AnalyzerConfig {
            graph_directory: std::path::PathBuf::from("."),
            input_field_name: "user_input".to_string(),
            contexts: vec![Context::Html],
            threads: 1,
            output: None,
            iteration_bound: 16,
            limits: crate::features::automaton::Limits::default(),
        }
    }

    fn straight_line_htmlspecialchars() -> DepGraph {
        let mut g = DepGraph::new();
        let input = g.add_node(Node::Input { name: "user_input".to_string() });
        let op = g.add_node(Node::Operation { op: "htmlspecialchars".to_string() });
        let sink = g.add_node(Node::Sink);
        g.add_child(op, 0, input);
        g.add_child(sink, 0, op);
        g
    }

    #[test]
    fn forward_image_of_htmlspecialchars_excludes_bare_angle_bracket() {
        let analyzer = Analyzer::new(SsvEngine::default());
        let graph = straight_line_htmlspecialchars();
        let seed = ForwardSeed::any_string(analyzer.engine());
        let mut metrics = PhaseMetrics::default();
        let (_, post) = analyzer.forward(&graph, &seed, &config(), &mut metrics).unwrap();
        let html = crate::features::catalogue::pattern_for(Context::Html);
        let overlap = analyzer.engine().intersect(&post, &html).unwrap();
        assert!(overlap.is_empty());
    }

    #[test]
    fn backward_from_empty_sink_yields_empty_preimage() {
        let analyzer = Analyzer::new(SsvEngine::default());
        let graph = straight_line_htmlspecialchars();
        let seed = ForwardSeed::any_string(analyzer.engine());
        let mut metrics = PhaseMetrics::default();
        let (forward_table, _) = analyzer.forward(&graph, &seed, &config(), &mut metrics).unwrap();
        let back = analyzer
            .backward(&graph, &forward_table, analyzer.engine().empty(), &config(), &mut metrics)
            .unwrap();
        let input = graph.find_input("user_input").unwrap();
        assert!(back.get(input).map(|v| v.is_empty()).unwrap_or(true));
    }

    #[test]
    fn cyclic_scc_terminates_with_widening() {
        // n = union(epsilon, concat(n, "a")) — §8 scenario 6's shape: a
        // phi-style base case joined with the recursive step.
        let mut g = DepGraph::new();
        let epsilon_lit = g.add_node(Node::Literal { value: Vec::new() });
        let literal_a = g.add_node(Node::Literal { value: b"a".to_vec() });
        let union_node = g.add_node(Node::Operation { op: "union".to_string() });
        let concat_node = g.add_node(Node::Operation { op: "concat".to_string() });
        let sink = g.add_node(Node::Sink);
        g.add_child(union_node, 0, epsilon_lit);
        g.add_child(union_node, 1, concat_node);
        g.add_child(concat_node, 0, union_node);
        g.add_child(concat_node, 1, literal_a);
        g.add_child(sink, 0, union_node);

        let analyzer = Analyzer::new(SsvEngine::default());
        let seed = ForwardSeed::any_string(analyzer.engine());
        let mut metrics = PhaseMetrics::default();
        let (_, post) = analyzer.forward(&g, &seed, &config(), &mut metrics).unwrap();
        // Over-approximated but must at least contain "a" (true least
        // fixpoint is {a}*).
        let a = analyzer.engine().of_literal(b"a").unwrap();
        let overlap = analyzer.engine().intersect(&post, &a).unwrap();
        assert!(overlap.equals(&a));
    }
}
