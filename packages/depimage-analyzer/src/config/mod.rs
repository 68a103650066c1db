//! Analyzer configuration: a single flat struct, not the teacher's 3-tier
//! preset/patch/provenance system (`config::{preset, patch, provenance}`) —
//! that system exists there because its pipeline has 20+ independently
//! tunable stages; this engine has one knob set. The ambient concern ("a
//! configuration layer exists, is validated, and is constructed from CLI
//! flags") is kept; the teacher's tiering is not.

use crate::errors::{EngineError, EngineResult};
use crate::features::automaton::Limits;
use crate::features::catalogue::Context;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub graph_directory: PathBuf,
    pub input_field_name: String,
    pub contexts: Vec<Context>,
    pub threads: usize,
    pub output: Option<PathBuf>,
    /// Bound on Kleene iteration at an SCC before widening kicks in (§4.5).
    pub iteration_bound: usize,
    pub limits: Limits,
}

impl AnalyzerConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.graph_directory.as_os_str().is_empty() {
            return Err(EngineError::Config("graph directory must not be empty".to_string()));
        }
        if self.threads == 0 {
            return Err(EngineError::Config("threads must be >= 1".to_string()));
        }
        if self.iteration_bound == 0 {
            return Err(EngineError::Config("iteration bound must be >= 1".to_string()));
        }
        if self.contexts.is_empty() {
            return Err(EngineError::Config("at least one context must be selected".to_string()));
        }
        Ok(())
    }
}
