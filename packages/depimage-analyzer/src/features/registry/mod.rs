//! Operation Semantics Registry (C4): a process-global, read-only mapping
//! from operation-node name to `{arity, fwd, bwd, commutes_with_union}`.
//!
//! Grounded on `PatternRegistry` (`registry.rs`): a plain map populated
//! once at startup, looked up by name on the hot path with no locking.
//! Numeric/literal operands (a pattern, a replacement, a character set, a
//! length bound) are themselves child nodes in the DepGraph — per §3,
//! "the second child of `replace` is the pattern" — so every descriptor
//! reads them back from the corresponding child's already-computed SSV
//! via [`Ssv::singleton_value`] rather than taking them as out-of-band
//! parameters.

use crate::errors::{EngineError, EngineResult};
use crate::features::ssv::{Ssv, SsvEngine};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

pub type FwdFn = fn(&SsvEngine, &[Ssv]) -> EngineResult<Ssv>;
/// `bwd(engine, parent_constraint, forward_values_of_children, child_index) -> pre-image for that child`.
pub type BwdFn = fn(&SsvEngine, &Ssv, &[Ssv], usize) -> EngineResult<Ssv>;

#[derive(Clone, Copy)]
pub struct OperationDescriptor {
    pub arity: usize,
    pub fwd: FwdFn,
    pub bwd: BwdFn,
    /// True for unary operations where `op(a∪b) = op(a)∪op(b)`, which
    /// holds for every single-child transform here (forward image always
    /// distributes over union elementwise); false once a second child
    /// participates, since the analyzer then needs the product language.
    pub commutes_with_union: bool,
}

fn literal_bytes(child: &Ssv) -> Option<Vec<u8>> {
    child.singleton_value()
}

fn literal_usize(child: &Ssv) -> Option<usize> {
    let bytes = literal_bytes(child)?;
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}

fn literal_usize_opt(child: &Ssv) -> Option<usize> {
    let bytes = literal_bytes(child)?;
    if bytes == b"inf" {
        return None;
    }
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}

fn unsupported(op: &str) -> EngineError {
    EngineError::UnsupportedOp(op.to_string())
}

fn arity_mismatch(op: &str, expected: usize, actual: usize) -> EngineError {
    EngineError::ArityMismatch {
        op: op.to_string(),
        expected,
        actual,
    }
}

fn require_arity(op: &str, children: &[Ssv], expected: usize) -> EngineResult<()> {
    if children.len() != expected {
        return Err(arity_mismatch(op, expected, children.len()));
    }
    Ok(())
}

macro_rules! unary_homomorphism {
    ($fwd_method:ident, $bwd_method:ident) => {
        |engine, children| {
            require_arity(stringify!($fwd_method), children, 1)?;
            Ok(engine.$fwd_method(&children[0])?)
        }
    };
}

fn build() -> FxHashMap<&'static str, OperationDescriptor> {
    let mut m: FxHashMap<&'static str, OperationDescriptor> = FxHashMap::default();

    m.insert(
        "union",
        OperationDescriptor {
            arity: 2,
            fwd: |engine, c| {
                require_arity("union", c, 2)?;
                Ok(engine.union(&c[0], &c[1])?)
            },
            bwd: |_engine, parent, _fwd, _idx| {
                // A required union value y is reached if either side
                // alone reaches it; each side's pre-image is simply
                // `parent` (sound, since the other side could be empty).
                Ok(parent.clone())
            },
            commutes_with_union: false,
        },
    );

    m.insert(
        "intersect",
        OperationDescriptor {
            arity: 2,
            fwd: |engine, c| {
                require_arity("intersect", c, 2)?;
                Ok(engine.intersect(&c[0], &c[1])?)
            },
            bwd: |_engine, parent, _fwd, _idx| {
                // x ∩ y ⊆ required ⟸ x ⊆ required is sufficient for this
                // side while the other retains its own forward value.
                Ok(parent.clone())
            },
            commutes_with_union: false,
        },
    );

    m.insert(
        "concat",
        OperationDescriptor {
            arity: 2,
            fwd: |engine, c| {
                require_arity("concat", c, 2)?;
                Ok(engine.concat(&c[0], &c[1])?)
            },
            bwd: |engine, _parent, _fwd, _idx| {
                // Exact quotient of a concatenation is expressible but not
                // implemented; any_string() is a sound over-approximation.
                Ok(engine.any_string().mark_approximate())
            },
            commutes_with_union: false,
        },
    );

    m.insert(
        "complement",
        OperationDescriptor {
            arity: 1,
            fwd: |engine, c| {
                require_arity("complement", c, 1)?;
                Ok(engine.complement(&c[0])?)
            },
            bwd: |engine, parent, _fwd, _idx| Ok(engine.complement(parent)?),
            commutes_with_union: true,
        },
    );

    m.insert(
        "to_upper",
        OperationDescriptor {
            arity: 1,
            fwd: unary_homomorphism!(to_upper_forward, to_upper_backward),
            bwd: |engine, parent, _fwd, _idx| engine.to_upper_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "to_lower",
        OperationDescriptor {
            arity: 1,
            fwd: unary_homomorphism!(to_lower_forward, to_lower_backward),
            bwd: |engine, parent, _fwd, _idx| engine.to_lower_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "html_escape",
        OperationDescriptor {
            arity: 1,
            fwd: unary_homomorphism!(html_escape_forward, html_escape_backward),
            bwd: |engine, parent, _fwd, _idx| engine.html_escape_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "htmlspecialchars",
        OperationDescriptor {
            arity: 1,
            fwd: unary_homomorphism!(htmlspecialchars_forward, htmlspecialchars_backward),
            bwd: |engine, parent, _fwd, _idx| engine.htmlspecialchars_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "url_encode",
        OperationDescriptor {
            arity: 1,
            fwd: unary_homomorphism!(url_encode_forward, url_encode_backward),
            bwd: |engine, parent, _fwd, _idx| engine.url_encode_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "url_decode",
        OperationDescriptor {
            arity: 1,
            fwd: |engine, c| {
                require_arity("url_decode", c, 1)?;
                Ok(engine.url_decode_forward(&c[0])?)
            },
            bwd: |engine, parent, _fwd, _idx| Ok(engine.url_decode_backward(parent)),
            commutes_with_union: true,
        },
    );

    m.insert(
        "addslashes",
        OperationDescriptor {
            arity: 1,
            fwd: unary_homomorphism!(addslashes_forward, addslashes_backward),
            bwd: |engine, parent, _fwd, _idx| engine.addslashes_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "trim_left",
        OperationDescriptor {
            arity: 1,
            fwd: |engine, c| {
                require_arity("trim_left", c, 1)?;
                Ok(engine.trim_left_forward(&c[0])?)
            },
            bwd: |engine, parent, _fwd, _idx| engine.trim_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "trim_right",
        OperationDescriptor {
            arity: 1,
            fwd: |engine, c| {
                require_arity("trim_right", c, 1)?;
                Ok(engine.trim_right_forward(&c[0])?)
            },
            bwd: |engine, parent, _fwd, _idx| engine.trim_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "trim_ws",
        OperationDescriptor {
            arity: 1,
            fwd: |engine, c| {
                require_arity("trim_ws", c, 1)?;
                Ok(engine.trim_ws_forward(&c[0])?)
            },
            bwd: |engine, parent, _fwd, _idx| engine.trim_backward(parent).map_err(Into::into),
            commutes_with_union: true,
        },
    );

    m.insert(
        "char_escape",
        OperationDescriptor {
            arity: 2,
            fwd: |engine, c| {
                require_arity("char_escape", c, 2)?;
                let set = literal_bytes(&c[1]).ok_or_else(|| unsupported("char_escape (non-literal set)"))?;
                Ok(engine.char_escape_forward(&c[0], &set)?)
            },
            bwd: |engine, parent, fwd, idx| {
                if idx != 0 {
                    return Ok(parent.clone());
                }
                let set = literal_bytes(&fwd[1]).ok_or_else(|| unsupported("char_escape (non-literal set)"))?;
                Ok(engine.char_escape_backward(parent, &set)?)
            },
            commutes_with_union: false,
        },
    );

    m.insert(
        "replace",
        OperationDescriptor {
            arity: 3,
            fwd: |engine, c| {
                require_arity("replace", c, 3)?;
                let pattern = literal_bytes(&c[1]).ok_or_else(|| unsupported("replace (non-literal pattern)"))?;
                let replacement =
                    literal_bytes(&c[2]).ok_or_else(|| unsupported("replace (non-literal replacement)"))?;
                Ok(engine.replace_forward(&c[0], &pattern, &replacement)?)
            },
            bwd: |engine, parent, _fwd, idx| {
                if idx != 0 {
                    return Ok(parent.clone());
                }
                Ok(engine.replace_backward(parent))
            },
            commutes_with_union: false,
        },
    );

    m.insert(
        "substring",
        OperationDescriptor {
            arity: 3,
            fwd: |engine, c| {
                require_arity("substring", c, 3)?;
                let i = literal_usize(&c[1]).ok_or_else(|| unsupported("substring (non-literal bound)"))?;
                let j = literal_usize(&c[2]).ok_or_else(|| unsupported("substring (non-literal bound)"))?;
                Ok(engine.substring_forward(&c[0], i, j)?)
            },
            bwd: |engine, parent, fwd, idx| {
                if idx != 0 {
                    return Ok(parent.clone());
                }
                let i = literal_usize(&fwd[1]).unwrap_or(0);
                let j = literal_usize(&fwd[2]).unwrap_or(usize::MAX);
                Ok(engine.substring_backward(parent, i, j))
            },
            commutes_with_union: false,
        },
    );

    m.insert(
        "length_restrict",
        OperationDescriptor {
            arity: 3,
            fwd: |engine, c| {
                require_arity("length_restrict", c, 3)?;
                let min = literal_usize(&c[1]).ok_or_else(|| unsupported("length_restrict (non-literal min)"))?;
                let max = literal_usize_opt(&c[2]);
                Ok(engine.length_restrict_forward(&c[0], min, max)?)
            },
            bwd: |engine, parent, fwd, idx| {
                if idx != 0 {
                    return Ok(parent.clone());
                }
                let min = literal_usize(&fwd[1]).unwrap_or(0);
                let max = literal_usize_opt(&fwd[2]);
                Ok(engine.length_restrict_backward(parent, min, max)?)
            },
            commutes_with_union: false,
        },
    );

    m
}

static REGISTRY: Lazy<FxHashMap<&'static str, OperationDescriptor>> = Lazy::new(build);

pub fn lookup(op: &str) -> Option<&'static OperationDescriptor> {
    REGISTRY.get(op)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escape_is_registered_unary_and_commuting() {
        let d = lookup("html_escape").unwrap();
        assert_eq!(d.arity, 1);
        assert!(d.commutes_with_union);
    }

    #[test]
    fn replace_is_ternary_and_non_commuting() {
        let d = lookup("replace").unwrap();
        assert_eq!(d.arity, 3);
        assert!(!d.commutes_with_union);
    }

    #[test]
    fn unknown_operation_is_not_registered() {
        assert!(lookup("not_a_real_op").is_none());
    }
}
