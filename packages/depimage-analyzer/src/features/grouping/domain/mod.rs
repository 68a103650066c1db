//! Automaton Grouping (C7): an equivalence-classed bucket of per-file
//! analysis results, keyed on language equality rather than structural
//! equality of the underlying DFA.
//!
//! Grounded on `AutomatonGroups.cpp`'s upsert-on-create semantics: creating
//! a named group for an automaton that is already equivalent to an
//! existing group renames that group rather than duplicating it.

use crate::features::ssv::Ssv;

#[derive(Debug, Clone)]
pub struct AutomatonGroup<T> {
    pub name: Option<String>,
    pub representative: Ssv,
    pub members: Vec<T>,
}

/// Invariant: no two groups in one table have equivalent representatives
/// (§3, "Automaton Group").
#[derive(Debug, Clone, Default)]
pub struct GroupTable<T> {
    groups: Vec<AutomatonGroup<T>>,
}

impl<T> GroupTable<T> {
    pub fn new() -> Self {
        GroupTable { groups: Vec::new() }
    }

    pub fn groups(&self) -> &[AutomatonGroup<T>] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Fingerprint-short-circuited equivalence lookup (§4.7): only pay for
    /// the full `equals` check on a fingerprint match.
    fn find_equivalent(&self, ssv: &Ssv) -> Option<usize> {
        let fp = ssv.fingerprint();
        self.groups
            .iter()
            .position(|g| g.representative.fingerprint() == fp && g.representative.equals(ssv))
    }

    /// Inserts `result` into the group whose representative is equivalent
    /// to `ssv`, creating an unnamed group if none exists.
    pub fn add(&mut self, ssv: &Ssv, result: T) {
        match self.find_equivalent(ssv) {
            Some(idx) => self.groups[idx].members.push(result),
            None => self.groups.push(AutomatonGroup {
                name: None,
                representative: ssv.clone(),
                members: vec![result],
            }),
        }
    }

    /// Seeds (or renames) a group labeled `name` for `ssv`. If a group
    /// already exists with an equivalent representative, it is renamed in
    /// place rather than duplicated — the exact upsert rule
    /// `AutomatonGroups::createGroup` implements.
    pub fn create_named(&mut self, ssv: &Ssv, name: impl Into<String>) {
        let name = name.into();
        match self.find_equivalent(ssv) {
            Some(idx) => self.groups[idx].name = Some(name),
            None => self.groups.push(AutomatonGroup {
                name: Some(name),
                representative: ssv.clone(),
                members: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::automaton::dfa::Dfa;

    #[test]
    fn add_groups_equivalent_automata_together() {
        let mut table: GroupTable<&'static str> = GroupTable::new();
        let a = Ssv::new(Dfa::any_string());
        let b = Ssv::new(Dfa::any_string());
        table.add(&a, "file_a.dot");
        table.add(&b, "file_b.dot");
        assert_eq!(table.len(), 1);
        assert_eq!(table.groups()[0].members.len(), 2);
    }

    #[test]
    fn create_named_renames_rather_than_duplicates() {
        let mut table: GroupTable<()> = GroupTable::new();
        let a = Ssv::new(Dfa::any_string());
        table.create_named(&a, "FirstName");
        let b = Ssv::new(Dfa::any_string());
        table.create_named(&b, "SecondName");
        assert_eq!(table.len(), 1);
        assert_eq!(table.groups()[0].name.as_deref(), Some("SecondName"));
    }
}
