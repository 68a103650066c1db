//! End-to-end scenarios from the component design's scenario table: one
//! straight-line or cyclic DepGraph per scenario, exercising forward image,
//! backward image, and grouping through the public crate API.

use depimage_analyzer::config::AnalyzerConfig;
use depimage_analyzer::features::analyzer::{Analyzer, ForwardSeed, PhaseMetrics};
use depimage_analyzer::features::automaton::Limits;
use depimage_analyzer::features::catalogue::{self, Context};
use depimage_analyzer::features::depgraph::{DepGraph, Node};
use depimage_analyzer::features::grouping::GroupTable;
use depimage_analyzer::features::ssv::SsvEngine;
use std::path::PathBuf;

fn config() -> AnalyzerConfig {
    AnalyzerConfig {
        graph_directory: PathBuf::from("."),
        input_field_name: "user_input".to_string(),
        contexts: vec![Context::Html],
        threads: 1,
        output: None,
        iteration_bound: 16,
        limits: Limits::default(),
    }
}

#[test]
fn scenario_1_bare_input_overlaps_html_with_angle_bracket_sample() {
    let mut g = DepGraph::new();
    let input = g.add_node(Node::Input { name: "user_input".to_string() });
    let sink = g.add_node(Node::Sink);
    g.add_child(sink, 0, input);

    let analyzer = Analyzer::new(SsvEngine::default());
    let seed = ForwardSeed::any_string(analyzer.engine());
    let (_, post) = analyzer.forward(&g, &seed, &config(), &mut PhaseMetrics::default()).unwrap();
    assert!(post.equals(&analyzer.engine().any_string()));

    let html = catalogue::pattern_for(Context::Html);
    let overlap = analyzer.engine().intersect(&post, &html).unwrap();
    assert!(!overlap.is_empty());
    assert!(catalogue::sample_payload(Context::Html).contains('<'));
}

#[test]
fn scenario_2_htmlspecialchars_output_is_clean_in_html_context() {
    let mut g = DepGraph::new();
    let input = g.add_node(Node::Input { name: "user_input".to_string() });
    let op = g.add_node(Node::Operation { op: "htmlspecialchars".to_string() });
    let sink = g.add_node(Node::Sink);
    g.add_child(op, 0, input);
    g.add_child(sink, 0, op);

    let analyzer = Analyzer::new(SsvEngine::default());
    let seed = ForwardSeed::any_string(analyzer.engine());
    let (_, post) = analyzer.forward(&g, &seed, &config(), &mut PhaseMetrics::default()).unwrap();

    let escaped = catalogue::comparator("HTML_ESCAPED").unwrap();
    assert!(escaped.dfa().contains(post.dfa(), analyzer.engine().limits()).unwrap());

    let html = catalogue::pattern_for(Context::Html);
    let overlap = analyzer.engine().intersect(&post, &html).unwrap();
    assert!(overlap.is_empty());
}

#[test]
fn scenario_3_concat_wraps_input_and_backward_recovers_a_superset() {
    let mut g = DepGraph::new();
    let input = g.add_node(Node::Input { name: "user_input".to_string() });
    let pre = g.add_node(Node::Literal { value: b"pre-".to_vec() });
    let post_lit = g.add_node(Node::Literal { value: b"-post".to_vec() });
    let inner = g.add_node(Node::Operation { op: "concat".to_string() });
    let outer = g.add_node(Node::Operation { op: "concat".to_string() });
    let sink = g.add_node(Node::Sink);
    g.add_child(inner, 0, pre);
    g.add_child(inner, 1, input);
    g.add_child(outer, 0, inner);
    g.add_child(outer, 1, post_lit);
    g.add_child(sink, 0, outer);

    let analyzer = Analyzer::new(SsvEngine::default());
    let engine = analyzer.engine();
    let seed = ForwardSeed::any_string(engine);
    let mut metrics = PhaseMetrics::default();
    let (forward_table, post) = analyzer.forward(&g, &seed, &config(), &mut metrics).unwrap();

    let expected = engine
        .concat(
            &engine.concat(&engine.of_literal(b"pre-").unwrap(), &engine.any_string()).unwrap(),
            &engine.of_literal(b"-post").unwrap(),
        )
        .unwrap();
    assert!(post.equals(&expected));

    let script = engine
        .concat(
            &engine.concat(&engine.any_string(), &engine.of_literal(b"<script>").unwrap()).unwrap(),
            &engine.any_string(),
        )
        .unwrap();
    let back = analyzer.backward(&g, &forward_table, script.clone(), &config(), &mut metrics).unwrap();
    let input_preimage = back.get(input).cloned().unwrap();
    // Backward over `concat` is a sound over-approximation (any_string()),
    // so it must at least contain the literal pattern we seeded.
    assert!(input_preimage.dfa().contains(script.dfa(), engine.limits()).unwrap());
}

#[test]
fn scenario_4_two_htmlspecialchars_files_group_under_the_named_quotes_group() {
    use depimage_analyzer::features::grouping::seed_common_groups;

    fn htmlspecialchars_graph() -> DepGraph {
        let mut g = DepGraph::new();
        let input = g.add_node(Node::Input { name: "user_input".to_string() });
        let op = g.add_node(Node::Operation { op: "htmlspecialchars".to_string() });
        let sink = g.add_node(Node::Sink);
        g.add_child(op, 0, input);
        g.add_child(sink, 0, op);
        g
    }

    let analyzer = Analyzer::new(SsvEngine::default());
    let seed = ForwardSeed::any_string(analyzer.engine());

    let mut groups: GroupTable<&'static str> = seed_common_groups(analyzer.engine());
    let (_, post_a) = analyzer
        .forward(&htmlspecialchars_graph(), &seed, &config(), &mut PhaseMetrics::default())
        .unwrap();
    let (_, post_b) = analyzer
        .forward(&htmlspecialchars_graph(), &seed, &config(), &mut PhaseMetrics::default())
        .unwrap();
    groups.add(&post_a, "file_a.dot");
    groups.add(&post_b, "file_b.dot");

    let group = groups
        .groups()
        .iter()
        .find(|g| g.members.contains(&"file_a.dot"))
        .unwrap();
    assert_eq!(group.members.len(), 2);
    assert_eq!(group.name.as_deref(), Some("HTMLEscape<>&\"'"));
}

#[test]
fn scenario_5_validation_patch_flags_inputs_outside_the_accepted_length_band() {
    // sink = complement(length_restrict(input, 0, 2)): the `complement`
    // node is what turns the empty() sink seed into a non-trivial
    // constraint on the validator beneath it during backward propagation.
    let mut g = DepGraph::new();
    let input = g.add_node(Node::Input { name: "user_input".to_string() });
    let min = g.add_node(Node::Literal { value: b"0".to_vec() });
    let max = g.add_node(Node::Literal { value: b"2".to_vec() });
    let length_check = g.add_node(Node::Operation { op: "length_restrict".to_string() });
    let complement_node = g.add_node(Node::Operation { op: "complement".to_string() });
    let sink = g.add_node(Node::Sink);
    g.add_child(length_check, 0, input);
    g.add_child(length_check, 1, min);
    g.add_child(length_check, 2, max);
    g.add_child(complement_node, 0, length_check);
    g.add_child(sink, 0, complement_node);

    let analyzer = Analyzer::new(SsvEngine::default());
    let engine = analyzer.engine();
    let patches = analyzer.validation_patch(&g, &config(), &mut PhaseMetrics::default()).unwrap();
    let patch = patches.get("user_input").unwrap();

    let accepted = engine.length_restrict_forward(&engine.any_string(), 0, Some(2)).unwrap();
    let expected_patch = engine.complement(&accepted).unwrap();
    assert!(patch.equals(&expected_patch));

    let too_long = engine.of_literal(b"abcd").unwrap();
    let overlap = engine.intersect(patch, &too_long).unwrap();
    assert!(!overlap.is_empty());

    let short = engine.of_literal(b"a").unwrap();
    let short_overlap = engine.intersect(patch, &short).unwrap();
    assert!(short_overlap.is_empty());
}

#[test]
fn scenario_6_cyclic_graph_terminates_and_over_approximates() {
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
    let (_, post) = analyzer.forward(&g, &seed, &config(), &mut PhaseMetrics::default()).unwrap();

    let a_star = analyzer.engine().of_regex("a*").unwrap();
    assert!(post.dfa().contains(a_star.dfa(), analyzer.engine().limits()).unwrap());
}

#[test]
fn phase_metrics_accumulate_across_forward_and_backward_and_merge() {
    let mut g = DepGraph::new();
    let input = g.add_node(Node::Input { name: "user_input".to_string() });
    let op = g.add_node(Node::Operation { op: "htmlspecialchars".to_string() });
    let sink = g.add_node(Node::Sink);
    g.add_child(op, 0, input);
    g.add_child(sink, 0, op);

    let analyzer = Analyzer::new(SsvEngine::default());
    let seed = ForwardSeed::any_string(analyzer.engine());
    let mut file_metrics = PhaseMetrics::default();
    let (forward_table, _) = analyzer.forward(&g, &seed, &config(), &mut file_metrics).unwrap();
    analyzer
        .backward(&g, &forward_table, analyzer.engine().empty(), &config(), &mut file_metrics)
        .unwrap();

    // Each phase records into its own field, not a shared global counter.
    assert!(file_metrics.validation_patch_ms == 0);
    assert!(file_metrics.sanitization_diff_ms == 0);

    let mut total = PhaseMetrics::default();
    total.merge(&file_metrics);
    total.merge(&file_metrics);
    assert_eq!(total.forward_ms, file_metrics.forward_ms * 2);
    assert_eq!(total.backward_ms, file_metrics.backward_ms * 2);
}
