//! Multi-File Driver (C8): parallel per-file analysis with result
//! grouping by automaton equivalence.

pub mod domain;
pub mod infrastructure;

pub use domain::{DriverReport, JobError, OverlapSummary, ReportedGroup};
pub use infrastructure::{discover_files, render_report, run};
