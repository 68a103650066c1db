//! Fixpoint Analyzer (C5) and Analysis Result Table (C6).

pub mod domain;
pub mod infrastructure;

pub use domain::{AnalysisResultTable, PhaseMetrics};
pub use infrastructure::{Analyzer, ForwardSeed, SanitizationDiff};
