//! Symbolic String Value (C1) — an immutable handle to a regular language.
//!
//! Grounded on the value-semantics + interned-backing-store guidance in the
//! design notes: an `Ssv` is cheap to clone (an `Arc` bump) and carries an
//! optional source-node tag used only to attribute intermediate results
//! during analysis (never part of equivalence).

use crate::features::automaton::dfa::Dfa;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Ssv {
    dfa: Arc<Dfa>,
    /// Set by the analyzer to attribute an intermediate value to the
    /// DepGraph node it came from. Not part of equivalence or hashing.
    pub source_tag: Option<String>,
    /// Set when a backward transfer function could not compute an exact
    /// pre-image and returned a sound over-approximation instead (§4.1).
    pub approximate: bool,
}

impl Ssv {
    pub fn new(dfa: Dfa) -> Self {
        Ssv {
            dfa: Arc::new(dfa),
            source_tag: None,
            approximate: false,
        }
    }

    pub fn dfa(&self) -> &Dfa {
        &self.dfa
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.source_tag = Some(tag.into());
        self
    }

    pub fn mark_approximate(mut self) -> Self {
        self.approximate = true;
        self
    }

    /// Equivalence is decidable language equality; the source tag and the
    /// approximate flag never participate.
    pub fn equals(&self, other: &Ssv) -> bool {
        self.dfa.equals(&other.dfa)
    }

    pub fn fingerprint(&self) -> u64 {
        self.dfa.fingerprint()
    }

    pub fn is_empty(&self) -> bool {
        self.dfa.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.dfa.is_singleton()
    }

    pub fn singleton_value(&self) -> Option<Vec<u8>> {
        self.dfa.singleton_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::automaton::dfa::Dfa;

    #[test]
    fn tag_does_not_affect_equivalence() {
        let a = Ssv::new(Dfa::any_string()).with_tag("node_1");
        let b = Ssv::new(Dfa::any_string()).with_tag("node_2");
        assert!(a.equals(&b));
    }
}
