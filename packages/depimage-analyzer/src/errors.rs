//! Crate-wide error type.
//!
//! Grounded on `CodegraphError`: a single `thiserror` enum plus small
//! constructor helpers, covering the error kinds §7 names.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOp(String),

    #[error("arity mismatch for {op}: expected {expected}, got {actual}")]
    ArityMismatch { op: String, expected: usize, actual: usize },

    #[error("input not found: {0}")]
    InputNotFound(String),

    #[error("resource exhausted")]
    ResourceExhausted,

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn parse_error(msg: impl Into<String>) -> Self {
        EngineError::ParseError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::InternalInvariant(msg.into())
    }
}

impl From<crate::features::automaton::FaError> for EngineError {
    fn from(e: crate::features::automaton::FaError) -> Self {
        use crate::features::automaton::FaError;
        match e {
            FaError::ResourceExhausted => EngineError::ResourceExhausted,
            FaError::UnsupportedRegex(m) | FaError::InvalidRegex(m) => EngineError::ParseError(m),
        }
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
