//! Finite-automaton adapter layer.
//!
//! §4.1 of the design treats determinization / minimization / product
//! construction as "assumed available as a black-box finite-automaton
//! library" and excludes it from the implementation budget. No published
//! crate exposes byte-alphabet DFA union/intersect/complement/minimize as a
//! single coherent API, so this module plays that role internally: callers
//! above it (`features::ssv`) only ever see [`dfa::Dfa`] and [`Limits`], the
//! same contract the design document specifies for the external library.

pub mod dfa;
pub mod nfa;

use thiserror::Error;

/// Resource bounds enforced while building or combining automata.
///
/// Mirrors the "per-automaton state and transition bounds" enforced by the
/// SSV layer (design §5, Resource limits).
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_states: usize,
    pub max_transitions: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_states: 20_000,
            max_transitions: 20_000 * 256,
        }
    }
}

/// Errors raised while building or combining automata.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FaError {
    #[error("resource exhausted: automaton exceeds configured state/transition bounds")]
    ResourceExhausted,

    #[error("unsupported regular expression construct: {0}")]
    UnsupportedRegex(String),

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
}

pub type FaResult<T> = Result<T, FaError>;
