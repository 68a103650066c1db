//! Multi-File Driver (C8) data model: per-job outcomes and the final
//! report shape (§6 Output).

use crate::errors::EngineError;
use crate::features::analyzer::PhaseMetrics;
use crate::features::catalogue::Context;
use crate::features::grouping::GroupTable;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct JobError {
    pub path: PathBuf,
    pub error: EngineError,
}

/// Whether a group's post-image overlaps an attack pattern, with a
/// canonical sample payload when it does (§6: "a sample string").
#[derive(Debug, Clone)]
pub struct OverlapSummary {
    pub context: Context,
    pub is_empty: bool,
    pub sample: Option<&'static str>,
}

#[derive(Debug, Clone, Default)]
pub struct DriverReport {
    pub groups: Vec<ReportedGroup>,
    pub failed: Vec<JobError>,
    /// Wall-clock time spent in each analyzer phase, summed across every
    /// file and job this run submitted to the worker pool.
    pub metrics: PhaseMetrics,
}

#[derive(Debug, Clone)]
pub struct ReportedGroup {
    pub name: Option<String>,
    pub files: Vec<PathBuf>,
    pub overlaps: Vec<OverlapSummary>,
}

impl DriverReport {
    pub fn files_analyzed(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }
}

/// Only used internally to thread `GroupTable` through the two-phase pool
/// before it is flattened into [`DriverReport`].
pub(crate) type FileGroupTable = GroupTable<PathBuf>;
