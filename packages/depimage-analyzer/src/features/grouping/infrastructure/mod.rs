//! Common-pattern pre-registration for C7.
//!
//! Grounded on `MultiAttack::fillCommonPatterns`: before any file is
//! analyzed, the grouping table is seeded with named groups for the
//! sanitizer residues the catalogue already compiles, so a post-image
//! that matches one is reported under a familiar name instead of an
//! anonymous group.

use super::domain::GroupTable;
use crate::features::catalogue;
use crate::features::ssv::SsvEngine;

/// Seeds the sixteen named common-pattern groups. Some names intentionally
/// resolve to the same automaton (e.g. `HTMLEscapeNoSlashes` and
/// `` HTMLEscape<>&"' `` both describe "escapes `<>&"'`, not `/`"); the
/// later call in this list wins the name, demonstrating
/// `GroupTable::create_named`'s upsert-rather-than-duplicate rule.
pub fn seed_common_groups<T>(engine: &SsvEngine) -> GroupTable<T> {
    let mut table = GroupTable::new();

    table.create_named(&engine.empty(), "Empty");
    table.create_named(&engine.any_string(), "SigmaStar");

    if let Some(ssv) = catalogue::comparator("HTML_ESCAPED") {
        table.create_named(&ssv, "HTMLEscaped");
    }
    if let Some(ssv) = catalogue::comparator("ENCODE_HTML_TAGS_ONLY") {
        table.create_named(&ssv, "HTMLEscapeTags");
    }
    if let Some(ssv) = catalogue::comparator("ENCODE_HTML_QUOTES") {
        table.create_named(&ssv, "HTMLEscapeNoSlashes");
    }
    if let Some(ssv) = catalogue::comparator("HTML_BACKTICK") {
        table.create_named(&ssv, "HTMLEscapeBacktick");
    }
    if let Some(ssv) = catalogue::comparator("HTML_REMOVED") {
        table.create_named(&ssv, "HTMLRemoved");
    }
    if let Some(ssv) = catalogue::comparator("HTML_REMOVED_NO_SLASH") {
        table.create_named(&ssv, "HTMLRemovedNoSlash");
    }
    if let Some(ssv) = catalogue::comparator("ENCODE_HTML_NO_QUOTES") {
        table.create_named(&ssv, "HTMLEscape<>&");
    }
    if let Some(ssv) = catalogue::comparator("ENCODE_HTML_COMPAT") {
        table.create_named(&ssv, "HTMLEscape<>&\"");
    }
    if let Some(ssv) = catalogue::comparator("ENCODE_HTML_QUOTES") {
        table.create_named(&ssv, "HTMLEscape<>&\"'");
    }
    if let Some(ssv) = catalogue::comparator("ENCODE_HTML_SLASH") {
        table.create_named(&ssv, "HTMLEscape<>&\"'/");
    }
    if let Some(ssv) = catalogue::comparator("HTML_ATTR_ESCAPED") {
        table.create_named(&ssv, "HTMLAttrEscaped");
    }
    if let Some(ssv) = catalogue::comparator("JAVASCRIPT_ESCAPED") {
        table.create_named(&ssv, "Javascript");
    }
    if let Some(ssv) = catalogue::comparator("URL_ESCAPED") {
        table.create_named(&ssv, "URL");
    }
    if let Some(ssv) = catalogue::comparator("URL_COMPONENT_ENCODED") {
        table.create_named(&ssv, "UriComponentEncoded");
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htmlspecialchars_output_lands_in_the_quotes_group() {
        let engine = SsvEngine::default();
        let mut table: GroupTable<&'static str> = seed_common_groups(&engine);
        let subject = engine.any_string();
        let escaped = engine.htmlspecialchars_forward(&subject).unwrap();
        table.add(&escaped, "file_a.dot");
        let group = table
            .groups()
            .iter()
            .find(|g| g.members.contains(&"file_a.dot"))
            .unwrap();
        assert_eq!(group.name.as_deref(), Some("HTMLEscape<>&\"'"));
    }

    #[test]
    fn seeding_produces_no_duplicate_representative_groups() {
        let engine = SsvEngine::default();
        let table: GroupTable<()> = seed_common_groups(&engine);
        for (i, a) in table.groups().iter().enumerate() {
            for b in table.groups().iter().skip(i + 1) {
                assert!(!a.representative.equals(&b.representative) || a.name == b.name);
            }
        }
    }
}
