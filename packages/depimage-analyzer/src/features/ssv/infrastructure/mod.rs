//! Concrete operation implementations backing C1's SSV contract.
//!
//! Every public method here returns a fresh, canonically-minimized [`Ssv`]
//! (construction is delegated to [`Dfa`], which minimizes on every public
//! constructor). Operations whose exact pre-image is not expressible as a
//! regular language mark their result with [`Ssv::mark_approximate`] rather
//! than silently returning an exact-looking value.

use super::domain::Ssv;
use crate::features::automaton::dfa::Dfa;
use crate::features::automaton::{FaResult, Limits};

/// Owns the resource [`Limits`] every automaton construction is checked
/// against. One engine is shared across an analysis run; it carries no
/// other state.
#[derive(Debug, Clone)]
pub struct SsvEngine {
    limits: Limits,
}

impl Default for SsvEngine {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}

impl SsvEngine {
    pub fn new(limits: Limits) -> Self {
        SsvEngine { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    // ---- constructors --------------------------------------------------

    pub fn empty(&self) -> Ssv {
        Ssv::new(Dfa::empty())
    }

    pub fn epsilon(&self) -> Ssv {
        Ssv::new(Dfa::epsilon())
    }

    pub fn any_string(&self) -> Ssv {
        Ssv::new(Dfa::any_string())
    }

    pub fn of_literal(&self, bytes: &[u8]) -> FaResult<Ssv> {
        Ok(Ssv::new(Dfa::of_literal(bytes, &self.limits)?))
    }

    pub fn of_char_range(&self, lo: u8, hi: u8) -> FaResult<Ssv> {
        Ok(Ssv::new(Dfa::of_char_range(lo, hi, &self.limits)?))
    }

    pub fn of_regex(&self, pattern: &str) -> FaResult<Ssv> {
        Ok(Ssv::new(Dfa::of_regex(pattern, &self.limits)?))
    }

    // ---- combinators -----------------------------------------------------

    pub fn union(&self, a: &Ssv, b: &Ssv) -> FaResult<Ssv> {
        Ok(Ssv::new(a.dfa().union(b.dfa(), &self.limits)?))
    }

    pub fn intersect(&self, a: &Ssv, b: &Ssv) -> FaResult<Ssv> {
        Ok(Ssv::new(a.dfa().intersect(b.dfa(), &self.limits)?))
    }

    pub fn complement(&self, a: &Ssv) -> FaResult<Ssv> {
        Ok(Ssv::new(a.dfa().complement(&self.limits)?))
    }

    pub fn concat(&self, a: &Ssv, b: &Ssv) -> FaResult<Ssv> {
        Ok(Ssv::new(a.dfa().concat(b.dfa(), &self.limits)?))
    }

    // `equals`/`contains`/`is_empty`/`is_singleton` need no engine state;
    // callers use the `Ssv` methods directly.

    // ---- replace ---------------------------------------------------------

    /// `F`: leftmost, non-overlapping replacement of `pattern` with
    /// `replacement` in every string of `subject`. Exact: literal-pattern
    /// replacement is a regular-language-preserving construction.
    pub fn replace_forward(&self, subject: &Ssv, pattern: &[u8], replacement: &[u8]) -> FaResult<Ssv> {
        let dfa = subject.dfa().replace_literal_forward(pattern, replacement, &self.limits)?;
        Ok(Ssv::new(dfa))
    }

    /// `B`: pre-image of a required post-replacement value. We cannot
    /// invert the replacement exactly without knowing which occurrences
    /// were replaced, so the sound over-approximation is "any string that
    /// could plausibly have produced something in `required` either by
    /// containing `pattern` or not" — collapsed here to `any_string()`
    /// when `required` is non-empty, `empty()` when it is not.
    pub fn replace_backward(&self, required: &Ssv) -> Ssv {
        if required.is_empty() {
            self.empty()
        } else {
            self.any_string().mark_approximate()
        }
    }

    // ---- substring ---------------------------------------------------------

    /// `F`: approximated per the design's "Σ*-padded slice" guidance —
    /// any string of length at most `j.saturating_sub(i)`.
    pub fn substring_forward(&self, _subject: &Ssv, i: usize, j: usize) -> FaResult<Ssv> {
        let max_len = j.saturating_sub(i);
        let dfa = Dfa::bounded_length_any(max_len, &self.limits)?;
        Ok(Ssv::new(dfa).mark_approximate())
    }

    /// `B`: a required substring value says nothing exact about the
    /// original subject bounds, so any subject containing it somewhere is
    /// admissible. Over-approximated as `any_string()`, consistent with
    /// the forward direction's padding approximation.
    pub fn substring_backward(&self, _required: &Ssv, _i: usize, _j: usize) -> Ssv {
        self.any_string().mark_approximate()
    }

    // ---- case conversion (exact homomorphisms) ----------------------------

    pub fn to_upper_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let map = case_map(|b| b.to_ascii_uppercase());
        Ok(Ssv::new(subject.dfa().homomorphism_forward(&map, &self.limits)?))
    }

    pub fn to_upper_backward(&self, required: &Ssv) -> FaResult<Ssv> {
        let map = case_map(|b| b.to_ascii_uppercase());
        Ok(Ssv::new(required.dfa().homomorphism_backward(&map, &self.limits)?))
    }

    pub fn to_lower_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let map = case_map(|b| b.to_ascii_lowercase());
        Ok(Ssv::new(subject.dfa().homomorphism_forward(&map, &self.limits)?))
    }

    pub fn to_lower_backward(&self, required: &Ssv) -> FaResult<Ssv> {
        let map = case_map(|b| b.to_ascii_lowercase());
        Ok(Ssv::new(required.dfa().homomorphism_backward(&map, &self.limits)?))
    }

    // ---- trimming (sound over-approximations) -----------------------------

    pub fn trim_left_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let dfa = subject.dfa().trim_left_ws(WHITESPACE, &self.limits)?;
        Ok(Ssv::new(dfa).mark_approximate())
    }

    pub fn trim_right_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let dfa = subject.dfa().trim_right_ws(WHITESPACE, &self.limits)?;
        Ok(Ssv::new(dfa).mark_approximate())
    }

    pub fn trim_ws_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let left = subject.dfa().trim_left_ws(WHITESPACE, &self.limits)?;
        let both = left.trim_right_ws(WHITESPACE, &self.limits)?;
        Ok(Ssv::new(both).mark_approximate())
    }

    /// `B` for every trim variant: a required trimmed value could have
    /// come from any subject that, after trimming, lands in `required` —
    /// the only sound closed form without inverting the quotient is to
    /// allow any subject containing it, padded by optional whitespace.
    pub fn trim_backward(&self, required: &Ssv) -> FaResult<Ssv> {
        let ws_star = Dfa::of_regex("[ \t\r\n]*", &self.limits)?;
        let padded = ws_star.concat(required.dfa(), &self.limits)?;
        let padded = padded.concat(&Dfa::of_regex("[ \t\r\n]*", &self.limits)?, &self.limits)?;
        Ok(Ssv::new(padded).mark_approximate())
    }

    // ---- escaping homomorphisms (exact) -----------------------------------

    /// `char_escape(set)`: prefix every byte in `set` with `\`, pass
    /// everything else through unchanged.
    pub fn char_escape_forward(&self, subject: &Ssv, set: &[u8]) -> FaResult<Ssv> {
        let map = escape_map(set, b'\\');
        Ok(Ssv::new(subject.dfa().homomorphism_forward(&map, &self.limits)?))
    }

    pub fn char_escape_backward(&self, required: &Ssv, set: &[u8]) -> FaResult<Ssv> {
        let map = escape_map(set, b'\\');
        Ok(Ssv::new(required.dfa().homomorphism_backward(&map, &self.limits)?))
    }

    pub fn html_escape_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let map = html_escape_map();
        Ok(Ssv::new(subject.dfa().homomorphism_forward(&map, &self.limits)?))
    }

    pub fn html_escape_backward(&self, required: &Ssv) -> FaResult<Ssv> {
        let map = html_escape_map();
        Ok(Ssv::new(required.dfa().homomorphism_backward(&map, &self.limits)?))
    }

    /// PHP's `htmlspecialchars` default quote style: `&`, `"`, `'`, `<`, `>`.
    pub fn htmlspecialchars_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        self.html_escape_forward(subject)
    }

    pub fn htmlspecialchars_backward(&self, required: &Ssv) -> FaResult<Ssv> {
        self.html_escape_backward(required)
    }

    pub fn url_encode_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let map = url_encode_map();
        Ok(Ssv::new(subject.dfa().homomorphism_forward(&map, &self.limits)?))
    }

    pub fn url_encode_backward(&self, required: &Ssv) -> FaResult<Ssv> {
        let map = url_encode_map();
        Ok(Ssv::new(required.dfa().homomorphism_backward(&map, &self.limits)?))
    }

    pub fn addslashes_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        self.char_escape_forward(subject, b"'\"\\\0")
    }

    pub fn addslashes_backward(&self, required: &Ssv) -> FaResult<Ssv> {
        self.char_escape_backward(required, b"'\"\\\0")
    }

    /// `url_decode` is not a per-byte homomorphism (it's variable-width on
    /// the *input* side), so it gets its own NFA-based construction;
    /// always approximate (see [`Dfa::url_decode_forward`]).
    pub fn url_decode_forward(&self, subject: &Ssv) -> FaResult<Ssv> {
        let dfa = subject.dfa().url_decode_forward(&self.limits)?;
        Ok(Ssv::new(dfa).mark_approximate())
    }

    pub fn url_decode_backward(&self, _required: &Ssv) -> Ssv {
        self.any_string().mark_approximate()
    }

    // ---- length restriction (exact) ---------------------------------------

    pub fn length_restrict_forward(&self, subject: &Ssv, min: usize, max: Option<usize>) -> FaResult<Ssv> {
        let bound = Dfa::length_between(min, max, &self.limits)?;
        Ok(Ssv::new(subject.dfa().intersect(&bound, &self.limits)?))
    }

    /// `B`: the operation only ever shrinks the language via intersection,
    /// so the pre-image of a required parent value is exactly that value
    /// intersected with the same length bound.
    pub fn length_restrict_backward(&self, required: &Ssv, min: usize, max: Option<usize>) -> FaResult<Ssv> {
        let bound = Dfa::length_between(min, max, &self.limits)?;
        Ok(Ssv::new(required.dfa().intersect(&bound, &self.limits)?))
    }
}

const WHITESPACE: &[u8] = b" \t\r\n";

fn identity_map() -> [Vec<u8>; 256] {
    std::array::from_fn(|b| vec![b as u8])
}

fn case_map(f: impl Fn(u8) -> u8) -> [Vec<u8>; 256] {
    std::array::from_fn(|b| vec![f(b as u8)])
}

fn escape_map(set: &[u8], prefix: u8) -> [Vec<u8>; 256] {
    let mut map = identity_map();
    for &b in set {
        map[b as usize] = vec![prefix, b];
    }
    map
}

/// `&` → `&amp;`, `<` → `&lt;`, `>` → `&gt;`, `"` → `&quot;`, `'` → `&#039;`.
/// Matches PHP's `htmlspecialchars(ENT_QUOTES)` table, grounded on the
/// attack-pattern catalogue's `ENCODE_HTML_QUOTES` residue pattern.
fn html_escape_map() -> [Vec<u8>; 256] {
    let mut map = identity_map();
    map[b'&' as usize] = b"&amp;".to_vec();
    map[b'<' as usize] = b"&lt;".to_vec();
    map[b'>' as usize] = b"&gt;".to_vec();
    map[b'"' as usize] = b"&quot;".to_vec();
    map[b'\'' as usize] = b"&#039;".to_vec();
    map
}

/// RFC 3986 unreserved characters pass through unchanged; everything else
/// becomes `%XX`.
fn url_encode_map() -> [Vec<u8>; 256] {
    let mut map: [Vec<u8>; 256] = std::array::from_fn(|b| {
        let byte = b as u8;
        vec![b'%', hex_digit(byte >> 4), hex_digit(byte & 0xF)]
    });
    for b in b'A'..=b'Z' {
        map[b as usize] = vec![b];
    }
    for b in b'a'..=b'z' {
        map[b as usize] = vec![b];
    }
    for b in b'0'..=b'9' {
        map[b as usize] = vec![b];
    }
    for &b in b"-_.~" {
        map[b as usize] = vec![b];
    }
    map
}

fn hex_digit(nibble: u8) -> u8 {
    if nibble < 10 {
        b'0' + nibble
    } else {
        b'A' + nibble - 10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_upper_roundtrips_through_backward() {
        let engine = SsvEngine::default();
        let subject = engine.of_literal(b"abc").unwrap();
        let upper = engine.to_upper_forward(&subject).unwrap();
        assert_eq!(upper.singleton_value(), Some(b"ABC".to_vec()));
    }

    #[test]
    fn html_escape_is_exact_and_injective_on_ampersand() {
        let engine = SsvEngine::default();
        let subject = engine.of_literal(b"<a>").unwrap();
        let escaped = engine.html_escape_forward(&subject).unwrap();
        assert_eq!(escaped.singleton_value(), Some(b"&lt;a&gt;".to_vec()));
        assert!(!escaped.approximate);
    }

    #[test]
    fn length_restrict_filters_short_strings() {
        let engine = SsvEngine::default();
        let subject = engine.any_string();
        let restricted = engine.length_restrict_forward(&subject, 3, Some(3)).unwrap();
        assert_eq!(restricted.singleton_value(), None);
        assert!(!restricted.is_empty());
    }

    #[test]
    fn replace_forward_is_exact_for_literal_pattern() {
        let engine = SsvEngine::default();
        let subject = engine.of_literal(b"foobar").unwrap();
        let replaced = engine.replace_forward(&subject, b"foo", b"baz").unwrap();
        assert_eq!(replaced.singleton_value(), Some(b"bazbar".to_vec()));
    }

    #[test]
    fn trim_left_is_marked_approximate() {
        let engine = SsvEngine::default();
        let subject = engine.of_literal(b"  x").unwrap();
        let trimmed = engine.trim_left_forward(&subject).unwrap();
        assert!(trimmed.approximate);
    }
}
