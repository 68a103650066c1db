//! DepGraph Model (C3): the expression graph the analyzer evaluates,
//! its acyclic condensation, and the DOT file reader that feeds it.

pub mod domain;
pub mod infrastructure;

pub use domain::{DepGraph, Node, NodeId};
pub use infrastructure::{condense, topological_order, AcyclicGraph, SccId, SccNode};
