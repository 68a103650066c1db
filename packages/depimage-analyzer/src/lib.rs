//! Symbolic string analysis over DepGraphs.
//!
//! Feature-first layout:
//! - `features::automaton` — byte-alphabet DFA/NFA adapter (determinize,
//!   minimize, product).
//! - `features::ssv`       — Symbolic String Value: regular languages with
//!   string-semantic operations.
//! - `features::catalogue` — fixed attack-pattern / sanitizer-residue
//!   regular languages.
//! - `features::depgraph`  — the expression graph the analyzer evaluates,
//!   plus its DOT reader.
//! - `features::registry`  — per-operation forward/backward transfer
//!   functions.
//! - `features::analyzer`  — the fixpoint analyzer (forward, backward,
//!   validation-patch, sanitization-diff).
//! - `features::grouping`  — equivalence-classed buckets of per-file results.
//! - `features::driver`    — multi-file discovery and the worker pool.
//!
//! `config` holds the single settings struct; `errors` holds the crate-wide
//! error type.

pub mod config;
pub mod errors;
pub mod features;
