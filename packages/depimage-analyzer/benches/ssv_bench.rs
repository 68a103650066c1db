//! Benchmarks for the SSV engine's automaton-level operations: construction
//! from literals/regexes, the lattice combinators, and a small forward-image
//! pass over a DepGraph. Mirrors the registry-vs-hardcoded comparison shape
//! of the teacher's pattern-matching benchmarks, here comparing construction
//! paths (literal vs. regex) and combinator cost as automaton size grows.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use depimage_analyzer::config::AnalyzerConfig;
use depimage_analyzer::features::analyzer::{Analyzer, ForwardSeed, PhaseMetrics};
use depimage_analyzer::features::automaton::Limits;
use depimage_analyzer::features::catalogue::Context;
use depimage_analyzer::features::depgraph::{DepGraph, Node};
use depimage_analyzer::features::ssv::SsvEngine;
use std::path::PathBuf;

fn config() -> AnalyzerConfig {
    AnalyzerConfig {
        graph_directory: PathBuf::from("."),
        input_field_name: "user_input".to_string(),
        contexts: vec![Context::Html],
        threads: 1,
        output: None,
        iteration_bound: 64,
        limits: Limits::default(),
    }
}

fn bench_literal_construction(c: &mut Criterion) {
    let engine = SsvEngine::default();
    let lengths = [4usize, 16, 64, 256];

    let mut group = c.benchmark_group("Literal Construction");
    for len in lengths {
        let literal = vec![b'a'; len];
        group.bench_with_input(BenchmarkId::new("of_literal", len), &literal, |b, lit| {
            b.iter(|| {
                let ssv = engine.of_literal(black_box(lit)).unwrap();
                black_box(ssv);
            })
        });
    }
    group.finish();
}

fn bench_regex_construction(c: &mut Criterion) {
    let engine = SsvEngine::default();
    let patterns = [
        ("narrow", "[a-z]{1,8}"),
        ("alternation", "(foo|bar|baz|qux){1,4}"),
        ("wide", "[\\x00-\\xff]{0,16}"),
    ];

    let mut group = c.benchmark_group("Regex Construction");
    for (name, pattern) in patterns {
        group.bench_with_input(BenchmarkId::new("of_regex", name), pattern, |b, pat| {
            b.iter(|| {
                let ssv = engine.of_regex(black_box(pat)).unwrap();
                black_box(ssv);
            })
        });
    }
    group.finish();
}

fn bench_combinators(c: &mut Criterion) {
    let engine = SsvEngine::default();
    let a = engine.of_regex("[a-z]{1,12}").unwrap();
    let b_ssv = engine.of_regex("[0-9]{1,12}").unwrap();

    let mut group = c.benchmark_group("Combinators");
    group.bench_function("union", |bencher| {
        bencher.iter(|| black_box(engine.union(black_box(&a), black_box(&b_ssv)).unwrap()))
    });
    group.bench_function("intersect", |bencher| {
        bencher.iter(|| black_box(engine.intersect(black_box(&a), black_box(&b_ssv)).unwrap()))
    });
    group.bench_function("complement", |bencher| {
        bencher.iter(|| black_box(engine.complement(black_box(&a)).unwrap()))
    });
    group.bench_function("concat", |bencher| {
        bencher.iter(|| black_box(engine.concat(black_box(&a), black_box(&b_ssv)).unwrap()))
    });
    group.finish();
}

fn bench_html_escape_forward(c: &mut Criterion) {
    let engine = SsvEngine::default();
    let inputs = [
        ("any_string", engine.any_string()),
        ("narrow_alpha", engine.of_regex("[a-zA-Z]{1,32}").unwrap()),
    ];

    let mut group = c.benchmark_group("HTML Escape Forward");
    for (name, ssv) in &inputs {
        group.bench_with_input(BenchmarkId::new("html_escape_forward", name), ssv, |b, s| {
            b.iter(|| black_box(engine.html_escape_forward(black_box(s)).unwrap()))
        });
    }
    group.finish();
}

fn bench_forward_image_pipeline(c: &mut Criterion) {
    let mut g = DepGraph::new();
    let input = g.add_node(Node::Input { name: "user_input".to_string() });
    let escape = g.add_node(Node::Operation { op: "htmlspecialchars".to_string() });
    let pre = g.add_node(Node::Literal { value: b"<div>".to_vec() });
    let post = g.add_node(Node::Literal { value: b"</div>".to_vec() });
    let inner = g.add_node(Node::Operation { op: "concat".to_string() });
    let outer = g.add_node(Node::Operation { op: "concat".to_string() });
    let sink = g.add_node(Node::Sink);
    g.add_child(escape, 0, input);
    g.add_child(inner, 0, pre);
    g.add_child(inner, 1, escape);
    g.add_child(outer, 0, inner);
    g.add_child(outer, 1, post);
    g.add_child(sink, 0, outer);

    let analyzer = Analyzer::new(SsvEngine::default());
    let cfg = config();

    c.bench_function("forward_image_pipeline", |b| {
        b.iter(|| {
            let seed = ForwardSeed::any_string(analyzer.engine());
            let mut metrics = PhaseMetrics::default();
            let (_, out) = analyzer
                .forward(black_box(&g), black_box(&seed), black_box(&cfg), &mut metrics)
                .unwrap();
            black_box(out);
        })
    });
}

criterion_group!(
    benches,
    bench_literal_construction,
    bench_regex_construction,
    bench_combinators,
    bench_html_escape_forward,
    bench_forward_image_pipeline
);
criterion_main!(benches);
