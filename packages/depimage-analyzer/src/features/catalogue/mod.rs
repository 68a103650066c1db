//! Attack Pattern Catalogue (C2): a fixed table of named patterns compiled
//! once at process startup into SSVs.
//!
//! Grounded on `AttackPatterns.hpp`'s context/sanitizer-residue pattern
//! pairs — each context pattern names the set of strings that can inject
//! in that context, and each residue pattern is the complement of a
//! characters-to-escape regex over Σ*, exactly mirroring
//! `getAttackPatternForContext` / `getHtmlEscaped` and friends. The actual
//! regex text is fixed by the external interface (see the crate's design
//! notes) rather than invented here.

use crate::features::automaton::Limits;
use crate::features::ssv::Ssv;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// The six injection contexts the analyzer reasons about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    Html,
    HtmlAttr,
    Javascript,
    Url,
    Sql,
    Mfe,
}

impl Context {
    pub fn name(self) -> &'static str {
        match self {
            Context::Html => "HTML",
            Context::HtmlAttr => "HTML_ATTR",
            Context::Javascript => "JAVASCRIPT",
            Context::Url => "URL",
            Context::Sql => "SQL",
            Context::Mfe => "MFE",
        }
    }

    pub fn all() -> [Context; 6] {
        [
            Context::Html,
            Context::HtmlAttr,
            Context::Javascript,
            Context::Url,
            Context::Sql,
            Context::Mfe,
        ]
    }
}

impl std::str::FromStr for Context {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTML" => Ok(Context::Html),
            "HTML_ATTR" => Ok(Context::HtmlAttr),
            "JS" | "JAVASCRIPT" => Ok(Context::Javascript),
            "URL" => Ok(Context::Url),
            "SQL" => Ok(Context::Sql),
            "MFE" => Ok(Context::Mfe),
            other => Err(format!("unknown context: {other}")),
        }
    }
}

struct Catalogue {
    contexts: FxHashMap<&'static str, Ssv>,
    comparators: FxHashMap<&'static str, Ssv>,
}

fn compile(limits: &Limits, pattern: &str) -> Ssv {
    Ssv::new(
        crate::features::automaton::dfa::Dfa::of_regex(pattern, limits)
            .unwrap_or_else(|e| panic!("catalogue pattern {pattern:?} failed to compile: {e}")),
    )
}

fn complement_of(limits: &Limits, allowed_regex: &str) -> Ssv {
    let allowed = crate::features::automaton::dfa::Dfa::of_regex(allowed_regex, limits)
        .unwrap_or_else(|e| panic!("catalogue pattern {allowed_regex:?} failed to compile: {e}"));
    Ssv::new(
        allowed
            .complement(limits)
            .unwrap_or_else(|e| panic!("catalogue complement failed: {e}")),
    )
}

fn build(limits: &Limits) -> Catalogue {
    let mut contexts = FxHashMap::default();
    let mut comparators = FxHashMap::default();

    // §6: "HTML disallows unescaped <, >, ', ", \; & allowed only when
    // followed by amp;|lt;|gt;|quot;|apos;|#\d+;". We encode the pattern
    // positively (the injecting set) as any string containing one of the
    // bare dangerous characters, or a bare unescaped `&`.
    let html_allowed = r#"([^<>'"\\&]|&(amp;|lt;|gt;|quot;|apos;|#[0-9]+;))*"#;
    contexts.insert(Context::Html.name(), complement_of(limits, html_allowed));
    comparators.insert("HTML_ESCAPED", complement_of(limits, html_allowed));

    let html_attr_allowed = r#"([A-Za-z0-9]|&(amp;|lt;|gt;|quot;|apos;|#[0-9]+;))*"#;
    contexts.insert(Context::HtmlAttr.name(), complement_of(limits, html_attr_allowed));
    comparators.insert("HTML_ATTR_ESCAPED", complement_of(limits, html_attr_allowed));

    let js_allowed = r#"([A-Za-z0-9,._ \t\n\r]|\\x[0-9A-Fa-f]{2}|\\u[0-9A-Fa-f]{4})*"#;
    contexts.insert(Context::Javascript.name(), complement_of(limits, js_allowed));
    comparators.insert("JAVASCRIPT_ESCAPED", complement_of(limits, js_allowed));

    let url_allowed = r#"([A-Za-z0-9\-_.~]|%[0-9A-Fa-f]{2})*"#;
    contexts.insert(Context::Url.name(), complement_of(limits, url_allowed));
    comparators.insert("URL_ESCAPED", complement_of(limits, url_allowed));
    comparators.insert("URL_COMPONENT_ENCODED", complement_of(limits, url_allowed));

    // SQL/MFE context patterns: the source's `getUndesiredSQLTest` /
    // `getUndesiredMFETest` check for quote-breakout and template-literal
    // breakout respectively; modeled positively as "contains an unescaped
    // quote" / "contains an unescaped template delimiter".
    contexts.insert(Context::Sql.name(), compile(limits, r#".*['"].*"#));
    contexts.insert(Context::Mfe.name(), compile(limits, r#".*(\$\{|<%|%>).*"#));

    // Residue patterns with no direct context counterpart above.
    comparators.insert("HTML_REMOVED", complement_of(limits, r#"[^<>'"\\&/]*"#));
    comparators.insert("HTML_REMOVED_NO_SLASH", complement_of(limits, r#"[^<>'"\\&]*"#));
    comparators.insert(
        "ENCODE_HTML_COMPAT",
        complement_of(limits, r#"([^<>&"]|&(amp|lt|gt|quot);)*"#),
    );
    comparators.insert(
        "ENCODE_HTML_NO_QUOTES",
        complement_of(limits, r#"([^<>&]|&(amp|lt|gt);)*"#),
    );
    comparators.insert(
        "ENCODE_HTML_QUOTES",
        complement_of(limits, r#"([^<>&"']|&(amp|lt|gt|quot|#039);)*"#),
    );
    comparators.insert(
        "ENCODE_HTML_SLASH",
        complement_of(limits, r#"([^<>&"'/]|&(amp|lt|gt|quot|#039|#x2F);)*"#),
    );
    comparators.insert("ENCODE_HTML_TAGS_ONLY", complement_of(limits, r#"([^<>]|&(lt|gt);)*"#));
    comparators.insert("HTML_BACKTICK", complement_of(limits, r#"[^`]*"#));
    comparators.insert("HTML_NO_SLASHES", complement_of(limits, r#"[^/]*"#));

    Catalogue { contexts, comparators }
}

static CATALOGUE: Lazy<Catalogue> = Lazy::new(|| build(&Limits::default()));

/// The attack pattern for a context: the set of strings that can inject
/// there.
pub fn pattern_for(context: Context) -> Ssv {
    CATALOGUE.contexts[context.name()].clone()
}

/// A named sanitizer-residue comparator.
pub fn comparator(name: &str) -> Option<Ssv> {
    CATALOGUE.comparators.get(name).cloned()
}

/// A sample payload known to trip the `HTML` context pattern, grounded on
/// `AttackPatterns::getHtmlPayload()`.
pub fn sample_payload(context: Context) -> &'static str {
    match context {
        Context::Html | Context::HtmlAttr => "<script>alert(1)</script>",
        Context::Javascript => "\\x3cscript\\x3e",
        Context::Url => "javascript:alert(1)",
        Context::Sql => "' OR '1'='1",
        Context::Mfe => "${7*7}",
    }
}

/// Recompiles the catalogue against custom limits; used only by tests that
/// need a tighter resource bound than the process-global default.
#[cfg(test)]
fn build_for_test(limits: &Limits) -> Catalogue {
    build(limits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_pattern_flags_unescaped_angle_bracket() {
        let c = build_for_test(&Limits::default());
        let html = &c.contexts[Context::Html.name()];
        let bracket = Ssv::new(
            crate::features::automaton::dfa::Dfa::of_literal(b"<script>", &Limits::default()).unwrap(),
        );
        let overlap = Ssv::new(
            html.dfa().intersect(bracket.dfa(), &Limits::default()).unwrap(),
        );
        assert!(!overlap.is_empty());
    }

    #[test]
    fn html_escaped_comparator_excludes_bare_ampersand() {
        let c = build_for_test(&Limits::default());
        let escaped = &c.comparators["HTML_ESCAPED"];
        let bare_amp = Ssv::new(crate::features::automaton::dfa::Dfa::of_literal(b"&", &Limits::default()).unwrap());
        let overlap = Ssv::new(escaped.dfa().intersect(bare_amp.dfa(), &Limits::default()).unwrap());
        assert!(overlap.is_empty());
    }

    #[test]
    fn context_from_str_accepts_js_alias() {
        assert_eq!("JS".parse::<Context>().unwrap(), Context::Javascript);
    }
}
