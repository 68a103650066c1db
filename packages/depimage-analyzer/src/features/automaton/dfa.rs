//! Deterministic, total, minimal finite automata over the byte alphabet.
//!
//! Every public constructor returns a *canonical* minimal DFA: states are
//! renumbered by BFS from the start state, exploring byte 0 before byte 1
//! before byte 2, and so on. Two automata accepting the same language always
//! minimize to the same canonical table, which is what lets [`Dfa::equals`]
//! and [`Dfa::fingerprint`] work by plain structural comparison rather than a
//! dedicated equivalence algorithm.

use super::nfa::Nfa;
use super::{FaError, FaResult, Limits};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

pub type StateId = u32;

#[derive(Debug, Clone)]
pub struct Dfa {
    /// `trans[s][byte]` is the (always-defined) successor state.
    pub(crate) trans: Vec<[StateId; 256]>,
    pub(crate) accept: Vec<bool>,
    pub(crate) start: StateId,
}

impl Dfa {
    fn check_bounds(states: usize, limits: &Limits) -> FaResult<()> {
        if states > limits.max_states || states.saturating_mul(256) > limits.max_transitions {
            return Err(FaError::ResourceExhausted);
        }
        Ok(())
    }

    pub fn num_states(&self) -> usize {
        self.trans.len()
    }

    pub fn start(&self) -> StateId {
        self.start
    }

    pub fn is_accepting(&self, s: StateId) -> bool {
        self.accept[s as usize]
    }

    pub fn step(&self, s: StateId, byte: u8) -> StateId {
        self.trans[s as usize][byte as usize]
    }

    // ---- constants -------------------------------------------------

    pub fn empty() -> Self {
        // Single non-accepting state, total (self-loop on every byte).
        Dfa {
            trans: vec![[0; 256]],
            accept: vec![false],
            start: 0,
        }
    }

    pub fn epsilon() -> Self {
        let mut trans = [0u32; 256];
        // byte 0 is the dead state we append below.
        for b in trans.iter_mut() {
            *b = 1;
        }
        Dfa {
            trans: vec![trans, [1; 256]],
            accept: vec![true, false],
            start: 0,
        }
    }

    pub fn any_string() -> Self {
        Dfa {
            trans: vec![[0; 256]],
            accept: vec![true],
            start: 0,
        }
    }

    pub fn of_char_range(lo: u8, hi: u8, limits: &Limits) -> FaResult<Self> {
        from_nfa(Nfa::byte_range(lo.min(hi), hi.max(lo)), limits)
    }

    pub fn of_literal(bytes: &[u8], limits: &Limits) -> FaResult<Self> {
        from_nfa(Nfa::literal(bytes), limits)
    }

    pub fn of_regex(pattern: &str, limits: &Limits) -> FaResult<Self> {
        let nfa = super::nfa::compile_regex(pattern)?;
        from_nfa(nfa, limits)
    }

    // ---- predicates --------------------------------------------------

    pub fn is_empty(&self) -> bool {
        let mut seen = vec![false; self.trans.len()];
        let mut stack = vec![self.start as usize];
        seen[self.start as usize] = true;
        while let Some(s) = stack.pop() {
            if self.accept[s] {
                return false;
            }
            for byte in 0..=255u16 {
                let t = self.trans[s][byte as usize] as usize;
                if !seen[t] {
                    seen[t] = true;
                    stack.push(t);
                }
            }
        }
        true
    }

    pub fn equals(&self, other: &Dfa) -> bool {
        self.start == other.start && self.trans == other.trans && self.accept == other.accept
    }

    /// L(b) ⊆ L(self).
    pub fn contains(&self, other: &Dfa, limits: &Limits) -> FaResult<bool> {
        let comp = self.complement(limits)?;
        let prod = product(&comp, other, limits, |a, b| a && b)?;
        Ok(prod.is_empty())
    }

    /// True iff the language is a single string; returns that string too.
    pub fn singleton_value(&self) -> Option<Vec<u8>> {
        let live = self.live_states();
        if live.is_empty() {
            return None;
        }
        // Detect a cycle restricted to live states: if present, the
        // language is infinite, so it cannot be a singleton.
        if self.has_live_cycle(&live) {
            return None;
        }
        let order = self.topo_order(&live);
        // counts[s] = number of distinct strings accepted from s, capped at 2.
        let mut counts: FxHashMap<usize, u64> = FxHashMap::default();
        for &s in order.iter().rev() {
            let mut c: u64 = if self.accept[s] { 1 } else { 0 };
            for byte in 0..=255u16 {
                let t = self.trans[s][byte as usize] as usize;
                if live.contains(&t) {
                    c = c.saturating_add(*counts.get(&t).unwrap_or(&0));
                }
                if c >= 2 {
                    break;
                }
            }
            counts.insert(s, c.min(2));
        }
        if *counts.get(&(self.start as usize)).unwrap_or(&0) != 1 {
            return None;
        }
        // Reconstruct the unique string by walking greedily.
        let mut out = Vec::new();
        let mut s = self.start as usize;
        loop {
            if self.accept[s] {
                return Some(out);
            }
            let mut moved = false;
            for byte in 0..=255u16 {
                let t = self.trans[s][byte as usize] as usize;
                if live.contains(&t) && *counts.get(&t).unwrap_or(&0) >= 1 {
                    out.push(byte as u8);
                    s = t;
                    moved = true;
                    break;
                }
            }
            if !moved {
                return None;
            }
        }
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton_value().is_some()
    }

    fn live_states(&self) -> FxHashSet<usize> {
        let n = self.trans.len();
        let mut reachable = vec![false; n];
        let mut stack = vec![self.start as usize];
        reachable[self.start as usize] = true;
        while let Some(s) = stack.pop() {
            for byte in 0..=255u16 {
                let t = self.trans[s][byte as usize] as usize;
                if !reachable[t] {
                    reachable[t] = true;
                    stack.push(t);
                }
            }
        }
        // Reverse graph reachability from accepting states.
        let mut rev: Vec<Vec<usize>> = vec![Vec::new(); n];
        for s in 0..n {
            for byte in 0..=255u16 {
                let t = self.trans[s][byte as usize] as usize;
                rev[t].push(s);
            }
        }
        let mut co_reachable = vec![false; n];
        let mut stack: Vec<usize> = (0..n).filter(|&s| self.accept[s]).collect();
        for &s in &stack {
            co_reachable[s] = true;
        }
        while let Some(s) = stack.pop() {
            for &p in &rev[s] {
                if !co_reachable[p] {
                    co_reachable[p] = true;
                    stack.push(p);
                }
            }
        }
        (0..n)
            .filter(|&s| reachable[s] && co_reachable[s])
            .collect()
    }

    fn has_live_cycle(&self, live: &FxHashSet<usize>) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let n = self.trans.len();
        let mut mark = vec![Mark::Unvisited; n];
        for &start in live {
            if mark[start] != Mark::Unvisited {
                continue;
            }
            let mut stack = vec![(start, 0u16)];
            mark[start] = Mark::InProgress;
            while let Some(&mut (s, ref mut byte)) = stack.last_mut() {
                if *byte > 255 {
                    mark[s] = Mark::Done;
                    stack.pop();
                    continue;
                }
                let t = self.trans[s][*byte as usize] as usize;
                *byte += 1;
                if !live.contains(&t) {
                    continue;
                }
                match mark[t] {
                    Mark::InProgress => return true,
                    Mark::Unvisited => {
                        mark[t] = Mark::InProgress;
                        stack.push((t, 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        false
    }

    fn topo_order(&self, live: &FxHashSet<usize>) -> Vec<usize> {
        let mut visited: FxHashSet<usize> = FxHashSet::default();
        let mut order = Vec::with_capacity(live.len());
        let mut stack: Vec<(usize, u16)> = Vec::new();
        for &root in live {
            if visited.contains(&root) {
                continue;
            }
            stack.push((root, 0));
            visited.insert(root);
            while let Some(&mut (s, ref mut byte)) = stack.last_mut() {
                if *byte > 255 {
                    order.push(s);
                    stack.pop();
                    continue;
                }
                let t = self.trans[s][*byte as usize] as usize;
                *byte += 1;
                if live.contains(&t) && !visited.contains(&t) {
                    visited.insert(t);
                    stack.push((t, 0));
                }
            }
        }
        order.reverse();
        order
    }

    // ---- combinators ---------------------------------------------------

    pub fn complement(&self, limits: &Limits) -> FaResult<Self> {
        let accept: Vec<bool> = self.accept.iter().map(|a| !a).collect();
        canonicalize(&self.trans, &accept, self.start, limits)
    }

    pub fn union(&self, other: &Dfa, limits: &Limits) -> FaResult<Self> {
        product(self, other, limits, |a, b| a || b)
    }

    pub fn intersect(&self, other: &Dfa, limits: &Limits) -> FaResult<Self> {
        product(self, other, limits, |a, b| a && b)
    }

    pub fn concat(&self, other: &Dfa, limits: &Limits) -> FaResult<Self> {
        concat_impl(self, other, limits)
    }

    /// One-or-more repetitions of `self`.
    pub fn plus(&self, limits: &Limits) -> FaResult<Self> {
        plus_impl(self, limits)
    }

    /// Zero-or-more repetitions of `self` (Kleene star).
    pub fn star(&self, limits: &Limits) -> FaResult<Self> {
        let plus = self.plus(limits)?;
        plus.union(&Dfa::epsilon(), limits)
    }

    /// Stable content-addressed fingerprint of the canonical minimal table.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.start.to_le_bytes());
        hasher.update(&(self.trans.len() as u64).to_le_bytes());
        for (i, row) in self.trans.iter().enumerate() {
            hasher.update(&[self.accept[i] as u8]);
            for &t in row.iter() {
                hasher.update(&t.to_le_bytes());
            }
        }
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();
        u64::from_le_bytes(bytes[0..8].try_into().unwrap())
    }
}

// =========================================================================
// Determinization
// =========================================================================

fn eps_closure(nfa: &Nfa, set: &FxHashSet<usize>) -> Vec<usize> {
    let mut closure: FxHashSet<usize> = set.clone();
    let mut stack: Vec<usize> = set.iter().copied().collect();
    while let Some(s) = stack.pop() {
        for &e in &nfa.states[s].eps_edges {
            if closure.insert(e) {
                stack.push(e);
            }
        }
    }
    let mut v: Vec<usize> = closure.into_iter().collect();
    v.sort_unstable();
    v
}

/// Subset construction over a raw `(byte_edges, eps_edges)` state graph
/// with an arbitrary start state and accept set, generalizing [`from_nfa`]
/// beyond single-start/single-accept [`Nfa`] fragments. Used by
/// [`Dfa::homomorphism_forward`], whose source graph has one state per
/// original `Dfa` state plus private per-edge expansion states.
fn determinize_general(
    byte_edges: &[Vec<(u8, u8, usize)>],
    eps_edges: &[Vec<usize>],
    start: usize,
    accepts: &FxHashSet<usize>,
    limits: &Limits,
) -> FaResult<Dfa> {
    let close = |set: &FxHashSet<usize>| -> Vec<usize> {
        let mut closure = set.clone();
        let mut stack: Vec<usize> = set.iter().copied().collect();
        while let Some(s) = stack.pop() {
            for &e in &eps_edges[s] {
                if closure.insert(e) {
                    stack.push(e);
                }
            }
        }
        let mut v: Vec<usize> = closure.into_iter().collect();
        v.sort_unstable();
        v
    };

    let start_key = close(&FxHashSet::from_iter([start]));
    let mut id_of: FxHashMap<Vec<usize>, StateId> = FxHashMap::default();
    let mut trans: Vec<[StateId; 256]> = Vec::new();
    let mut accept: Vec<bool> = Vec::new();
    id_of.insert(start_key.clone(), 0);
    trans.push([0; 256]);
    accept.push(start_key.iter().any(|s| accepts.contains(s)));
    let mut queue: VecDeque<Vec<usize>> = VecDeque::from([start_key]);

    while let Some(key) = queue.pop_front() {
        let id = id_of[&key] as usize;
        for byte in 0..=255u16 {
            let mut moved: FxHashSet<usize> = FxHashSet::default();
            for &s in &key {
                for &(lo, hi, t) in &byte_edges[s] {
                    if byte as u8 >= lo && byte as u8 <= hi {
                        moved.insert(t);
                    }
                }
            }
            let closed = close(&moved);
            let next_id = *id_of.entry(closed.clone()).or_insert_with(|| {
                let nid = trans.len() as StateId;
                trans.push([0; 256]);
                accept.push(closed.iter().any(|s| accepts.contains(s)));
                queue.push_back(closed);
                nid
            });
            Dfa::check_bounds(trans.len(), limits)?;
            trans[id][byte as usize] = next_id;
        }
    }
    canonicalize(&trans, &accept, 0, limits)
}

fn from_nfa(nfa: Nfa, limits: &Limits) -> FaResult<Dfa> {
    let start_key = eps_closure(&nfa, &FxHashSet::from_iter([nfa.start]));
    let mut id_of: FxHashMap<Vec<usize>, StateId> = FxHashMap::default();
    let mut trans: Vec<[StateId; 256]> = Vec::new();
    let mut accept: Vec<bool> = Vec::new();
    id_of.insert(start_key.clone(), 0);
    let mut queue: VecDeque<Vec<usize>> = VecDeque::new();
    queue.push_back(start_key);
    trans.push([0; 256]);
    accept.push(false);

    while let Some(key) = queue.pop_front() {
        let id = id_of[&key] as usize;
        accept[id] = key.contains(&nfa.accept);
        for byte in 0..=255u16 {
            let mut moved: FxHashSet<usize> = FxHashSet::default();
            for &s in &key {
                for &(lo, hi, t) in &nfa.states[s].byte_edges {
                    if byte as u8 >= lo && byte as u8 <= hi {
                        moved.insert(t);
                    }
                }
            }
            let closed = eps_closure(&nfa, &moved);
            let next_id = *id_of.entry(closed.clone()).or_insert_with(|| {
                let nid = trans.len() as StateId;
                trans.push([0; 256]);
                accept.push(false);
                queue.push_back(closed);
                nid
            });
            Dfa::check_bounds(trans.len(), limits)?;
            trans[id][byte as usize] = next_id;
        }
    }
    canonicalize(&trans, &accept, 0, limits)
}

// =========================================================================
// Product construction (union / intersect)
// =========================================================================

fn product(a: &Dfa, b: &Dfa, limits: &Limits, combine: impl Fn(bool, bool) -> bool) -> FaResult<Dfa> {
    let mut id_of: FxHashMap<(StateId, StateId), StateId> = FxHashMap::default();
    let mut trans: Vec<[StateId; 256]> = Vec::new();
    let mut accept: Vec<bool> = Vec::new();
    let start_pair = (a.start, b.start);
    id_of.insert(start_pair, 0);
    trans.push([0; 256]);
    accept.push(combine(a.accept[a.start as usize], b.accept[b.start as usize]));
    let mut queue: VecDeque<(StateId, StateId)> = VecDeque::new();
    queue.push_back(start_pair);

    while let Some((sa, sb)) = queue.pop_front() {
        let id = id_of[&(sa, sb)] as usize;
        for byte in 0..256usize {
            let ta = a.trans[sa as usize][byte];
            let tb = b.trans[sb as usize][byte];
            let next_id = *id_of.entry((ta, tb)).or_insert_with(|| {
                let nid = trans.len() as StateId;
                trans.push([0; 256]);
                accept.push(combine(
                    a.accept[ta as usize],
                    b.accept[tb as usize],
                ));
                queue.push_back((ta, tb));
                nid
            });
            Dfa::check_bounds(trans.len(), limits)?;
            trans[id][byte] = next_id;
        }
    }
    canonicalize(&trans, &accept, 0, limits)
}

// =========================================================================
// Concatenation: tagged-state subset construction over A then B.
// =========================================================================

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Pos {
    A(StateId),
    B(StateId),
}

fn concat_impl(a: &Dfa, b: &Dfa, limits: &Limits) -> FaResult<Dfa> {
    let closure = |set: &FxHashSet<Pos>| -> Vec<Pos> {
        let mut out: FxHashSet<Pos> = set.clone();
        if set.iter().any(|p| matches!(p, Pos::A(s) if a.accept[*s as usize])) {
            out.insert(Pos::B(b.start));
        }
        let mut v: Vec<Pos> = out.into_iter().collect();
        v.sort();
        v
    };
    let move_set = |set: &[Pos], byte: usize| -> FxHashSet<Pos> {
        let mut out = FxHashSet::default();
        for p in set {
            match p {
                Pos::A(s) => {
                    out.insert(Pos::A(a.trans[*s as usize][byte]));
                }
                Pos::B(s) => {
                    out.insert(Pos::B(b.trans[*s as usize][byte]));
                }
            }
        }
        out
    };
    let accepting = |set: &[Pos]| -> bool {
        set.iter()
            .any(|p| matches!(p, Pos::B(s) if b.accept[*s as usize]))
    };

    let start_set = closure(&FxHashSet::from_iter([Pos::A(a.start)]));
    let mut id_of: FxHashMap<Vec<Pos>, StateId> = FxHashMap::default();
    let mut trans: Vec<[StateId; 256]> = Vec::new();
    let mut accept: Vec<bool> = Vec::new();
    id_of.insert(start_set.clone(), 0);
    trans.push([0; 256]);
    accept.push(accepting(&start_set));
    let mut queue: VecDeque<Vec<Pos>> = VecDeque::new();
    queue.push_back(start_set);

    while let Some(key) = queue.pop_front() {
        let id = id_of[&key] as usize;
        for byte in 0..256usize {
            let moved = move_set(&key, byte);
            let closed = closure(&moved);
            let next_id = *id_of.entry(closed.clone()).or_insert_with(|| {
                let nid = trans.len() as StateId;
                trans.push([0; 256]);
                accept.push(accepting(&closed));
                queue.push_back(closed);
                nid
            });
            Dfa::check_bounds(trans.len(), limits)?;
            trans[id][byte] = next_id;
        }
    }
    canonicalize(&trans, &accept, 0, limits)
}

// =========================================================================
// One-or-more repetitions: tagged subset construction over A with a loop
// back to A's start whenever an accepting state is reached.
// =========================================================================

fn plus_impl(a: &Dfa, limits: &Limits) -> FaResult<Dfa> {
    let closure = |set: &FxHashSet<StateId>| -> Vec<StateId> {
        let mut out = set.clone();
        if set.iter().any(|&s| a.accept[s as usize]) {
            out.insert(a.start);
        }
        let mut v: Vec<StateId> = out.into_iter().collect();
        v.sort_unstable();
        v
    };
    let accepting = |set: &[StateId]| set.iter().any(|&s| a.accept[s as usize]);

    let start_set = closure(&FxHashSet::from_iter([a.start]));
    let mut id_of: FxHashMap<Vec<StateId>, StateId> = FxHashMap::default();
    let mut trans: Vec<[StateId; 256]> = Vec::new();
    let mut accept: Vec<bool> = Vec::new();
    id_of.insert(start_set.clone(), 0);
    trans.push([0; 256]);
    accept.push(accepting(&start_set));
    let mut queue: VecDeque<Vec<StateId>> = VecDeque::new();
    queue.push_back(start_set);

    while let Some(key) = queue.pop_front() {
        let id = id_of[&key] as usize;
        for byte in 0..256usize {
            let moved: FxHashSet<StateId> =
                key.iter().map(|&s| a.trans[s as usize][byte]).collect();
            let closed = closure(&moved);
            let next_id = *id_of.entry(closed.clone()).or_insert_with(|| {
                let nid = trans.len() as StateId;
                trans.push([0; 256]);
                accept.push(accepting(&closed));
                queue.push_back(closed);
                nid
            });
            Dfa::check_bounds(trans.len(), limits)?;
            trans[id][byte] = next_id;
        }
    }
    canonicalize(&trans, &accept, 0, limits)
}

// =========================================================================
// Minimization (Moore partition refinement) + canonical BFS renumbering.
// =========================================================================

fn canonicalize(
    trans: &[[StateId; 256]],
    accept: &[bool],
    start: StateId,
    limits: &Limits,
) -> FaResult<Dfa> {
    Dfa::check_bounds(trans.len(), limits)?;
    let reachable = reachable_from(trans, start);
    let (m_trans, m_accept, m_start) = minimize(trans, accept, start, &reachable);
    let (r_trans, r_accept, r_start) = renumber_bfs(&m_trans, &m_accept, m_start);
    Ok(Dfa {
        trans: r_trans,
        accept: r_accept,
        start: r_start,
    })
}

fn reachable_from(trans: &[[StateId; 256]], start: StateId) -> Vec<bool> {
    let mut seen = vec![false; trans.len()];
    let mut stack = vec![start as usize];
    seen[start as usize] = true;
    while let Some(s) = stack.pop() {
        for byte in 0..256usize {
            let t = trans[s][byte] as usize;
            if !seen[t] {
                seen[t] = true;
                stack.push(t);
            }
        }
    }
    seen
}

fn minimize(
    trans: &[[StateId; 256]],
    accept: &[bool],
    start: StateId,
    reachable: &[bool],
) -> (Vec<[StateId; 256]>, Vec<bool>, StateId) {
    let n = trans.len();
    let live: Vec<usize> = (0..n).filter(|&s| reachable[s]).collect();

    // Initial partition: accepting vs non-accepting among reachable states.
    let mut block_of: Vec<u32> = vec![0; n];
    for &s in &live {
        block_of[s] = if accept[s] { 1 } else { 0 };
    }
    let mut num_blocks = 2u32;

    loop {
        let mut sig_to_block: FxHashMap<(u32, Vec<u32>), u32> = FxHashMap::default();
        let mut new_block_of = vec![0u32; n];
        let mut next_id = 0u32;
        for &s in &live {
            let sig: Vec<u32> = (0..256)
                .map(|byte| block_of[trans[s][byte] as usize])
                .collect();
            let key = (block_of[s], sig);
            let id = *sig_to_block.entry(key).or_insert_with(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            new_block_of[s] = id;
        }
        if next_id == num_blocks {
            block_of = new_block_of;
            break;
        }
        num_blocks = next_id;
        block_of = new_block_of;
    }

    let mut rep_of_block: FxHashMap<u32, usize> = FxHashMap::default();
    for &s in &live {
        rep_of_block.entry(block_of[s]).or_insert(s);
    }
    let mut out_trans = vec![[0 as StateId; 256]; num_blocks as usize];
    let mut out_accept = vec![false; num_blocks as usize];
    for (&block, &rep) in rep_of_block.iter() {
        out_accept[block as usize] = accept[rep];
        for byte in 0..256usize {
            out_trans[block as usize][byte] = block_of[trans[rep][byte] as usize];
        }
    }
    (out_trans, out_accept, block_of[start as usize])
}

fn renumber_bfs(
    trans: &[[StateId; 256]],
    accept: &[bool],
    start: StateId,
) -> (Vec<[StateId; 256]>, Vec<bool>, StateId) {
    let mut new_id: FxHashMap<StateId, StateId> = FxHashMap::default();
    let mut order: Vec<StateId> = Vec::new();
    new_id.insert(start, 0);
    order.push(start);
    let mut queue: VecDeque<StateId> = VecDeque::from([start]);
    while let Some(s) = queue.pop_front() {
        for byte in 0..256usize {
            let t = trans[s as usize][byte];
            if !new_id.contains_key(&t) {
                let nid = new_id.len() as StateId;
                new_id.insert(t, nid);
                order.push(t);
                queue.push_back(t);
            }
        }
    }
    let mut out_trans = vec![[0 as StateId; 256]; order.len()];
    let mut out_accept = vec![false; order.len()];
    for (&old, &new) in new_id.iter() {
        out_accept[new as usize] = accept[old as usize];
        for byte in 0..256usize {
            out_trans[new as usize][byte] = new_id[&trans[old as usize][byte]];
        }
    }
    (out_trans, out_accept, 0)
}

impl Dfa {
    /// Public canonicalizing constructor from a raw (possibly non-minimal,
    /// possibly unreachable-state-laden) transition table.
    pub fn from_table(
        trans: Vec<[StateId; 256]>,
        accept: Vec<bool>,
        start: StateId,
        limits: &Limits,
    ) -> FaResult<Self> {
        canonicalize(&trans, &accept, start, limits)
    }

    /// Exact image of this automaton's language under a per-byte
    /// substitution `map[b]` (the output string for byte `b`). Used for
    /// `to_upper`/`to_lower`/`html_escape`/`url_encode`/`addslashes`/
    /// `char_escape` — every one of these is a letter-to-string
    /// homomorphism, which preserves regularity exactly.
    pub fn homomorphism_forward(&self, map: &[Vec<u8>; 256], limits: &Limits) -> FaResult<Dfa> {
        // Build an intermediate NFA-like graph: each original edge
        // `s -byte-> target` is re-keyed on `map[byte]` instead of `byte`.
        // A multi-byte output becomes a private chain of fresh states, a
        // single-byte output becomes one directly re-keyed edge, and an
        // empty output (deletion) becomes an epsilon edge straight to
        // `target` — then one subset construction determinizes the whole
        // thing, which correctly handles any resulting nondeterminism
        // (e.g. two input bytes whose outputs share a common prefix).
        let n = self.trans.len();
        let mut byte_edges: Vec<Vec<(u8, u8, usize)>> = vec![Vec::new(); n];
        let mut eps_edges: Vec<Vec<usize>> = vec![Vec::new(); n];
        let accepts: FxHashSet<usize> = (0..n).filter(|&s| self.accept[s]).collect();

        for s in 0..n {
            for byte in 0..256usize {
                let target = self.trans[s][byte] as usize;
                let out_bytes = &map[byte];
                match out_bytes.len() {
                    0 => eps_edges[s].push(target),
                    1 => byte_edges[s].push((out_bytes[0], out_bytes[0], target)),
                    _ => {
                        let mut cur = s;
                        for (i, ob) in out_bytes.iter().enumerate() {
                            let dest = if i + 1 == out_bytes.len() {
                                target
                            } else {
                                let fresh = byte_edges.len();
                                byte_edges.push(Vec::new());
                                eps_edges.push(Vec::new());
                                fresh
                            };
                            byte_edges[cur].push((*ob, *ob, dest));
                            cur = dest;
                        }
                    }
                }
            }
        }
        determinize_general(&byte_edges, &eps_edges, self.start as usize, &accepts, limits)
    }

    /// Pre-image under a per-byte homomorphism: `{x : map(x) ∈ L(self)}`.
    /// `self` is treated as the parent/output constraint.
    pub fn homomorphism_backward(&self, map: &[Vec<u8>; 256], limits: &Limits) -> FaResult<Dfa> {
        let n = self.trans.len();
        let mut trans: Vec<[StateId; 256]> = vec![[0; 256]; n];
        for s in 0..n {
            for byte in 0..256usize {
                let mut cur = s as StateId;
                for &ob in map[byte].iter() {
                    cur = self.trans[cur as usize][ob as usize];
                }
                trans[s][byte] = cur;
            }
        }
        canonicalize(&trans, &self.accept.clone(), self.start, limits)
    }

    /// Forward image under percent-decoding (`%XX` → the byte `0xXX`,
    /// anything else passed through literally). Deliberately
    /// nondeterministic at escape boundaries — an invalid or truncated
    /// `%` escape falls back to passing its bytes through literally — so
    /// the result is a sound over-approximation, never exact.
    pub fn url_decode_forward(&self, limits: &Limits) -> FaResult<Dfa> {
        // Phase per original state: None (ground), P (saw '%'), H(nibble)
        // (saw '%' and one hex digit worth `nibble`).
        let n = self.trans.len();
        let id_none = |s: usize| s;
        let id_p = |s: usize| n + s;
        let id_h = |s: usize, nibble: u8| 2 * n + s * 16 + nibble as usize;
        let total = 2 * n + n * 16;

        let mut byte_edges: Vec<Vec<(u8, u8, usize)>> = vec![Vec::new(); total];
        let mut eps_edges: Vec<Vec<usize>> = vec![Vec::new(); total];
        let accepts: FxHashSet<usize> = (0..n).filter(|&s| self.accept[s]).collect();

        let hex_val = |b: u8| -> Option<u8> {
            match b {
                b'0'..=b'9' => Some(b - b'0'),
                b'a'..=b'f' => Some(b - b'a' + 10),
                b'A'..=b'F' => Some(b - b'A' + 10),
                _ => None,
            }
        };
        // Append a chain emitting `bytes` in order, consuming nothing more
        // than the single underlying step already accounted for by the
        // caller, landing on `dest`.
        fn chain(
            byte_edges: &mut Vec<Vec<(u8, u8, usize)>>,
            eps_edges: &mut Vec<Vec<usize>>,
            from: usize,
            bytes: &[u8],
            dest: usize,
        ) {
            let mut cur = from;
            for (i, b) in bytes.iter().enumerate() {
                let next = if i + 1 == bytes.len() {
                    dest
                } else {
                    let fresh = byte_edges.len();
                    byte_edges.push(Vec::new());
                    eps_edges.push(Vec::new());
                    fresh
                };
                byte_edges[cur].push((*b, *b, next));
                cur = next;
            }
        }

        for s in 0..n {
            for byte in 0u16..256 {
                let b = byte as u8;
                let s_next = self.trans[s][byte as usize] as usize;
                if b == b'%' {
                    eps_edges[id_none(s)].push(id_p(s_next));
                } else {
                    byte_edges[id_none(s)].push((b, b, id_none(s_next)));
                }

                match hex_val(b) {
                    Some(nibble) => eps_edges[id_p(s)].push(id_h(s_next, nibble)),
                    None => chain(
                        &mut byte_edges,
                        &mut eps_edges,
                        id_p(s),
                        &[b'%', b],
                        id_none(s_next),
                    ),
                }

                for hi in 0u8..16 {
                    match hex_val(b) {
                        Some(lo) => {
                            let decoded = hi * 16 + lo;
                            byte_edges[id_h(s, hi)].push((decoded, decoded, id_none(s_next)));
                        }
                        None => {
                            let hex_char = if hi < 10 { b'0' + hi } else { b'A' + hi - 10 };
                            chain(
                                &mut byte_edges,
                                &mut eps_edges,
                                id_h(s, hi),
                                &[b'%', hex_char, b],
                                id_none(s_next),
                            );
                        }
                    }
                }
            }
        }
        determinize_general(&byte_edges, &eps_edges, id_none(self.start as usize), &accepts, limits)
    }

    /// Left quotient by a whitespace byte set: `{y : ∃x ∈ ws*, xy ∈ L}`.
    /// A sound over-approximation of "strip the leading whitespace run":
    /// it also admits splits shorter than the maximal run, so it can be a
    /// strict superset of the precise trimmed language.
    pub fn trim_left_ws(&self, ws: &[u8], limits: &Limits) -> FaResult<Dfa> {
        let mut frontier = vec![self.start];
        let mut seen: FxHashSet<StateId> = FxHashSet::from_iter([self.start]);
        let mut i = 0;
        while i < frontier.len() {
            let s = frontier[i];
            i += 1;
            for &b in ws {
                let t = self.trans[s as usize][b as usize];
                if seen.insert(t) {
                    frontier.push(t);
                }
            }
        }
        subset_from_multi_start(&self.trans, &self.accept, &seen, limits)
    }

    /// Right quotient by a whitespace byte set: `{x : ∃y ∈ ws*, xy ∈ L}`.
    /// Same over-approximation caveat as `trim_left_ws`, mirrored.
    pub fn trim_right_ws(&self, ws: &[u8], limits: &Limits) -> FaResult<Dfa> {
        let n = self.trans.len();
        let mut reaches_accept_via_ws = self.accept.clone();
        let mut changed = true;
        while changed {
            changed = false;
            for s in 0..n {
                if reaches_accept_via_ws[s] {
                    continue;
                }
                for &b in ws {
                    let t = self.trans[s][b as usize] as usize;
                    if reaches_accept_via_ws[t] {
                        reaches_accept_via_ws[s] = true;
                        changed = true;
                        break;
                    }
                }
            }
        }
        canonicalize(&self.trans, &reaches_accept_via_ws, self.start, limits)
    }

    /// The language of strings with length in `[min, max]` (max=None means
    /// unbounded above).
    pub fn length_between(min: usize, max: Option<usize>, limits: &Limits) -> FaResult<Dfa> {
        let cap = max.unwrap_or(min).max(min) + 1;
        let dead = cap + 1;
        let mut trans = vec![[0 as StateId; 256]; dead + 1];
        let mut accept = vec![false; dead + 1];
        for len in 0..=cap {
            let next = (len + 1).min(dead);
            for b in 0..256usize {
                trans[len][b] = next as StateId;
            }
        }
        for b in 0..256usize {
            trans[dead][b] = dead as StateId;
        }
        for len in min..=max.unwrap_or(cap).min(cap) {
            accept[len] = true;
        }
        if max.is_none() {
            // Unbounded above: every length >= min accepts, including the
            // saturated "many more bytes" bucket.
            for len in min..=cap {
                accept[len] = true;
            }
        }
        canonicalize(&trans, &accept, 0, limits)
    }

    /// Any string of length at most `max_len` — the "Σ*-padded slice"
    /// approximation §4.1 prescribes for `substring`.
    pub fn bounded_length_any(max_len: usize, limits: &Limits) -> FaResult<Dfa> {
        Dfa::length_between(0, Some(max_len), limits)
    }

    /// Exact leftmost, non-overlapping literal substring replacement
    /// (KMP-style matcher composed with the subject automaton).
    pub fn replace_literal_forward(
        &self,
        pattern: &[u8],
        replacement: &[u8],
        limits: &Limits,
    ) -> FaResult<Dfa> {
        if pattern.is_empty() {
            return Ok(self.clone());
        }
        let fail = kmp_failure(pattern);
        let plen = pattern.len();

        // New state = (subject_state, match_progress). match_progress in
        // 0..plen; plen itself never persists because a full match
        // immediately triggers the replacement emission and resets to 0.
        let mut id_of: FxHashMap<(StateId, usize), StateId> = FxHashMap::default();
        let mut trans: Vec<[StateId; 256]> = Vec::new();
        let mut accept: Vec<bool> = Vec::new();
        let start_key = (self.start, 0usize);
        id_of.insert(start_key, 0);
        trans.push([0; 256]);
        accept.push(self.accept[self.start as usize]);
        let mut queue: VecDeque<(StateId, usize)> = VecDeque::from([start_key]);

        while let Some((ss, k)) = queue.pop_front() {
            let id = id_of[&(ss, k)] as usize;
            for byte in 0..256usize {
                let b = byte as u8;
                let subj_next = self.trans[ss as usize][byte];
                let mut k2 = k;
                while k2 > 0 && pattern[k2] != b {
                    k2 = fail[k2 - 1];
                }
                if pattern[k2] == b {
                    k2 += 1;
                } else {
                    k2 = 0;
                }
                let (final_state, final_k) = if k2 == plen {
                    (subj_next, 0usize)
                } else {
                    (subj_next, k2)
                };
                let next_id = *id_of.entry((final_state, final_k)).or_insert_with(|| {
                    let nid = trans.len() as StateId;
                    trans.push([0; 256]);
                    accept.push(self.accept[final_state as usize] && final_k == 0);
                    queue.push_back((final_state, final_k));
                    nid
                });
                Dfa::check_bounds(trans.len(), limits)?;
                if k2 == plen {
                    // Emit `replacement` via a private chain of fresh states
                    // between `id` (on edge `byte`) and `next_id`. Each
                    // chain state only ever receives the single edge
                    // `replacement[i]`; no one else reaches it, so its
                    // other 255 edges are irrelevant and left as the
                    // default dead value 0.
                    let mut cur = id as StateId;
                    for (i, rb) in replacement.iter().enumerate() {
                        let dest = if i + 1 == replacement.len() {
                            next_id
                        } else {
                            let fresh = trans.len() as StateId;
                            trans.push([0; 256]);
                            accept.push(false);
                            fresh as StateId
                        };
                        if i == 0 {
                            trans[id][byte] = dest;
                        } else {
                            trans[cur as usize][*rb as usize] = dest;
                        }
                        cur = dest;
                    }
                    if replacement.is_empty() {
                        trans[id][byte] = next_id;
                    }
                } else {
                    trans[id][byte] = next_id;
                }
            }
        }
        canonicalize(&trans, &accept, 0, limits)
    }
}

fn kmp_failure(pattern: &[u8]) -> Vec<usize> {
    let mut fail = vec![0usize; pattern.len()];
    let mut k = 0usize;
    for i in 1..pattern.len() {
        while k > 0 && pattern[k] != pattern[i] {
            k = fail[k - 1];
        }
        if pattern[k] == pattern[i] {
            k += 1;
        }
        fail[i] = k;
    }
    fail
}

fn subset_from_multi_start(
    trans: &[[StateId; 256]],
    accept: &[bool],
    start_set: &FxHashSet<StateId>,
    limits: &Limits,
) -> FaResult<Dfa> {
    let mut key: Vec<StateId> = start_set.iter().copied().collect();
    key.sort_unstable();
    let mut id_of: FxHashMap<Vec<StateId>, StateId> = FxHashMap::default();
    let mut out_trans: Vec<[StateId; 256]> = Vec::new();
    let mut out_accept: Vec<bool> = Vec::new();
    id_of.insert(key.clone(), 0);
    out_trans.push([0; 256]);
    out_accept.push(key.iter().any(|&s| accept[s as usize]));
    let mut queue: VecDeque<Vec<StateId>> = VecDeque::from([key]);

    while let Some(k) = queue.pop_front() {
        let id = id_of[&k] as usize;
        for byte in 0..256usize {
            let mut moved: Vec<StateId> = k.iter().map(|&s| trans[s as usize][byte]).collect();
            moved.sort_unstable();
            moved.dedup();
            let next_id = *id_of.entry(moved.clone()).or_insert_with(|| {
                let nid = out_trans.len() as StateId;
                out_trans.push([0; 256]);
                out_accept.push(moved.iter().any(|&s| accept[s as usize]));
                queue.push_back(moved);
                nid
            });
            Dfa::check_bounds(out_trans.len(), limits)?;
            out_trans[id][byte] = next_id;
        }
    }
    canonicalize(&out_trans, &out_accept, 0, limits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lim() -> Limits {
        Limits::default()
    }

    #[test]
    fn empty_is_empty() {
        assert!(Dfa::empty().is_empty());
    }

    #[test]
    fn any_string_is_not_empty_and_not_singleton() {
        let a = Dfa::any_string();
        assert!(!a.is_empty());
        assert!(!a.is_singleton());
    }

    #[test]
    fn epsilon_is_singleton_empty_string() {
        let e = Dfa::epsilon();
        assert_eq!(e.singleton_value(), Some(Vec::new()));
    }

    #[test]
    fn literal_round_trips() {
        let a = Dfa::of_literal(b"abc", &lim()).unwrap();
        assert_eq!(a.singleton_value(), Some(b"abc".to_vec()));
    }

    #[test]
    fn union_contains_both() {
        let a = Dfa::of_literal(b"ab", &lim()).unwrap();
        let b = Dfa::of_literal(b"cd", &lim()).unwrap();
        let u = a.union(&b, &lim()).unwrap();
        assert!(!u.is_empty());
        assert!(u.contains(&a, &lim()).unwrap());
        assert!(u.contains(&b, &lim()).unwrap());
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = Dfa::of_literal(b"ab", &lim()).unwrap();
        let b = Dfa::of_literal(b"cd", &lim()).unwrap();
        assert!(a.intersect(&b, &lim()).unwrap().is_empty());
    }

    #[test]
    fn complement_of_complement_is_identity() {
        let a = Dfa::of_regex("[a-c]", &lim()).unwrap();
        let cc = a.complement(&lim()).unwrap().complement(&lim()).unwrap();
        assert!(a.equals(&cc));
    }

    #[test]
    fn concat_epsilon_identity() {
        let a = Dfa::of_literal(b"xy", &lim()).unwrap();
        let e = Dfa::epsilon();
        let left = e.concat(&a, &lim()).unwrap();
        let right = a.concat(&e, &lim()).unwrap();
        assert!(left.equals(&a));
        assert!(right.equals(&a));
    }

    #[test]
    fn star_contains_epsilon_and_is_infinite() {
        let a = Dfa::of_literal(b"a", &lim()).unwrap();
        let star = a.star(&lim()).unwrap();
        assert!(!star.is_singleton());
        assert_eq!(
            star.singleton_value(),
            None,
            "a* is infinite, not a singleton"
        );
        // "" is accepted.
        assert!(star.is_accepting(star.start()));
    }

    #[test]
    fn fingerprint_agrees_with_equals() {
        let a = Dfa::of_regex("[a-c]", &lim()).unwrap();
        let b = Dfa::of_char_range(b'a', b'c', &lim()).unwrap();
        assert!(a.equals(&b));
        assert_eq!(a.fingerprint(), b.fingerprint());
    }
}
