//! Symbolic String Value (C1): regular languages over the byte alphabet,
//! with the string-semantic operations the analyzer composes along a
//! DepGraph's operation nodes.

pub mod domain;
pub mod infrastructure;

pub use domain::Ssv;
pub use infrastructure::SsvEngine;
