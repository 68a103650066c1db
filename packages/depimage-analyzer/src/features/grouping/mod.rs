//! Automaton Grouping (C7): equivalence-classed buckets of per-file
//! analysis results, pre-seeded with named common sanitizer residues.

pub mod domain;
pub mod infrastructure;

pub use domain::{AutomatonGroup, GroupTable};
pub use infrastructure::seed_common_groups;
