//! Thompson construction of a byte-alphabet epsilon-NFA from a parsed regex.
//!
//! Built on `regex-syntax`'s AST (`Hir`) so the only hand-rolled piece is the
//! construction itself, not regex parsing. Byte mode is forced
//! (`utf8(false)`, `unicode(false)`) so every `Hir::Class` comes back as
//! `Class::Bytes`, matching the Σ = 0..=255 alphabet in §3 of the design.

use super::{FaError, FaResult};
use regex_syntax::hir::{Class, Hir, HirKind, Repetition};
use regex_syntax::ParserBuilder;

pub type StateId = usize;

#[derive(Debug, Clone, Default)]
pub struct NfaState {
    /// Inclusive byte ranges that, when matched, move to the given state.
    pub byte_edges: Vec<(u8, u8, StateId)>,
    /// Epsilon transitions.
    pub eps_edges: Vec<StateId>,
}

/// An epsilon-NFA fragment with a single start and single accept state.
#[derive(Debug, Clone)]
pub struct Nfa {
    pub states: Vec<NfaState>,
    pub start: StateId,
    pub accept: StateId,
}

impl Nfa {
    fn with_states(n: usize) -> (Vec<NfaState>, impl FnMut(&mut Vec<NfaState>) -> StateId) {
        let states = Vec::with_capacity(n);
        let alloc = |states: &mut Vec<NfaState>| -> StateId {
            states.push(NfaState::default());
            states.len() - 1
        };
        (states, alloc)
    }

    /// The language {""}.
    pub fn epsilon() -> Self {
        Nfa {
            states: vec![NfaState::default()],
            start: 0,
            accept: 0,
        }
    }

    /// The language ∅.
    pub fn empty() -> Self {
        // Start and accept are distinct with no path between them.
        Nfa {
            states: vec![NfaState::default(), NfaState::default()],
            start: 0,
            accept: 1,
        }
    }

    /// A single byte in the inclusive range [lo, hi].
    pub fn byte_range(lo: u8, hi: u8) -> Self {
        let mut states = vec![NfaState::default(), NfaState::default()];
        states[0].byte_edges.push((lo, hi, 1));
        Nfa {
            states,
            start: 0,
            accept: 1,
        }
    }

    /// A fixed byte string.
    pub fn literal(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            return Nfa::epsilon();
        }
        let mut states: Vec<NfaState> = (0..=bytes.len()).map(|_| NfaState::default()).collect();
        for (i, b) in bytes.iter().enumerate() {
            states[i].byte_edges.push((*b, *b, i + 1));
        }
        Nfa {
            states,
            start: 0,
            accept: bytes.len(),
        }
    }

    /// Merge `other`'s states into `self`, returning the offset applied to
    /// every one of `other`'s state ids.
    fn absorb(&mut self, other: Nfa) -> StateId {
        let offset = self.states.len();
        for st in other.states {
            let byte_edges = st
                .byte_edges
                .into_iter()
                .map(|(lo, hi, t)| (lo, hi, t + offset))
                .collect();
            let eps_edges = st.eps_edges.into_iter().map(|t| t + offset).collect();
            self.states.push(NfaState {
                byte_edges,
                eps_edges,
            });
        }
        offset
    }

    pub fn concat(a: Nfa, b: Nfa) -> Nfa {
        let mut out = a;
        let accept_a = out.accept;
        let offset_b = out.absorb(b.clone());
        out.states[accept_a].eps_edges.push(b.start + offset_b);
        out.accept = b.accept + offset_b;
        out
    }

    pub fn union(a: Nfa, b: Nfa) -> Nfa {
        let mut out = Nfa {
            states: vec![NfaState::default()],
            start: 0,
            accept: 0,
        };
        let off_a = out.absorb(a.clone());
        let off_b = out.absorb(b.clone());
        let new_accept = out.states.len();
        out.states.push(NfaState::default());
        out.states[0].eps_edges.push(a.start + off_a);
        out.states[0].eps_edges.push(b.start + off_b);
        out.states[a.accept + off_a].eps_edges.push(new_accept);
        out.states[b.accept + off_b].eps_edges.push(new_accept);
        out.accept = new_accept;
        out
    }

    /// Zero-or-more repetitions (Kleene star).
    pub fn star(a: Nfa) -> Nfa {
        let mut out = Nfa {
            states: vec![NfaState::default()],
            start: 0,
            accept: 0,
        };
        let off_a = out.absorb(a.clone());
        let new_accept = out.states.len();
        out.states.push(NfaState::default());
        out.states[0].eps_edges.push(a.start + off_a);
        out.states[0].eps_edges.push(new_accept);
        out.states[a.accept + off_a].eps_edges.push(a.start + off_a);
        out.states[a.accept + off_a].eps_edges.push(new_accept);
        out.accept = new_accept;
        out
    }

    /// Zero-or-one (optional).
    pub fn optional(a: Nfa) -> Nfa {
        Nfa::union(Nfa::epsilon(), a)
    }

    /// One-or-more.
    pub fn plus(a: Nfa) -> Nfa {
        Nfa::concat(a.clone(), Nfa::star(a))
    }
}

/// Parse `pattern` in byte mode and compile it into an epsilon-NFA.
pub fn compile_regex(pattern: &str) -> FaResult<Nfa> {
    let hir = ParserBuilder::new()
        .utf8(false)
        .unicode(false)
        .build()
        .parse(pattern)
        .map_err(|e| FaError::InvalidRegex(e.to_string()))?;
    compile_hir(&hir)
}

fn compile_hir(hir: &Hir) -> FaResult<Nfa> {
    match hir.kind() {
        HirKind::Empty => Ok(Nfa::epsilon()),
        HirKind::Literal(lit) => Ok(Nfa::literal(&lit.0)),
        HirKind::Class(Class::Bytes(class)) => {
            let mut frag: Option<Nfa> = None;
            for range in class.ranges() {
                let piece = Nfa::byte_range(range.start(), range.end());
                frag = Some(match frag {
                    None => piece,
                    Some(existing) => Nfa::union(existing, piece),
                });
            }
            frag.ok_or_else(|| FaError::UnsupportedRegex("empty class".to_string()))
        }
        HirKind::Class(Class::Unicode(class)) => {
            // unicode(false) should prevent this, but fall back to byte
            // ranges over the codepoints' low byte for ASCII-safe classes.
            let mut frag: Option<Nfa> = None;
            for range in class.ranges() {
                let lo = range.start() as u32;
                let hi = range.end() as u32;
                if lo > 0xFF || hi > 0xFF {
                    return Err(FaError::UnsupportedRegex(
                        "non-ASCII unicode class".to_string(),
                    ));
                }
                let piece = Nfa::byte_range(lo as u8, hi as u8);
                frag = Some(match frag {
                    None => piece,
                    Some(existing) => Nfa::union(existing, piece),
                });
            }
            frag.ok_or_else(|| FaError::UnsupportedRegex("empty class".to_string()))
        }
        HirKind::Repetition(rep) => compile_repetition(rep),
        HirKind::Capture(cap) => compile_hir(&cap.sub),
        HirKind::Concat(items) => {
            let mut iter = items.iter();
            let first = iter
                .next()
                .map(compile_hir)
                .unwrap_or_else(|| Ok(Nfa::epsilon()))?;
            iter.try_fold(first, |acc, h| Ok(Nfa::concat(acc, compile_hir(h)?)))
        }
        HirKind::Alternation(items) => {
            let mut iter = items.iter();
            let first = iter
                .next()
                .map(compile_hir)
                .unwrap_or_else(|| Ok(Nfa::empty()))?;
            iter.try_fold(first, |acc, h| Ok(Nfa::union(acc, compile_hir(h)?)))
        }
        HirKind::Look(_) => Err(FaError::UnsupportedRegex(
            "anchors are not meaningful over a closed regular language".to_string(),
        )),
    }
}

fn compile_repetition(rep: &Repetition) -> FaResult<Nfa> {
    let min = rep.min as usize;
    let sub = compile_hir(&rep.sub)?;

    let mut out = Nfa::epsilon();
    for _ in 0..min {
        out = Nfa::concat(out, sub.clone());
    }

    match rep.max {
        None => {
            out = Nfa::concat(out, Nfa::star(sub));
        }
        Some(max) => {
            let max = max as usize;
            if max < min {
                return Err(FaError::UnsupportedRegex(
                    "repetition max < min".to_string(),
                ));
            }
            for _ in 0..(max - min) {
                out = Nfa::concat(out, Nfa::optional(sub.clone()));
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_builds_chain() {
        let nfa = Nfa::literal(b"ab");
        assert_eq!(nfa.states.len(), 3);
    }

    #[test]
    fn compiles_simple_class() {
        let nfa = compile_regex("[a-z]").unwrap();
        assert!(nfa.states.len() >= 2);
    }

    #[test]
    fn rejects_anchors() {
        let err = compile_regex("^abc$").unwrap_err();
        assert!(matches!(err, FaError::UnsupportedRegex(_)));
    }
}
