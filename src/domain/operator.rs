//! Operator table: numeric MCC+MNC id → human name, built from `+COPN`
//! notifications.
//!
//! Additive and insertion-ordered: entries are never mutated once
//! inserted, and the whole table is cleared on SIM loss. IMSI→operator
//! lookup is a prefix match against the stored id (5 or 6 digits, per the
//! network); when more than one stored id prefix-matches, the first one
//! added wins.

/// A single operator-id → name mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorEntry {
    /// Numeric MCC+MNC id, 5 or 6 digits.
    pub id: String,
    pub name: String,
}

/// Insertion-ordered, additive-only table of known operators.
#[derive(Debug, Default)]
pub struct OperatorTable {
    entries: Vec<OperatorEntry>,
}

impl OperatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a `+COPN` notification. A duplicate id is ignored (additive
    /// means "never mutated once inserted", not "overwritten").
    pub fn insert(&mut self, id: impl Into<String>, name: impl Into<String>) {
        let id = id.into();
        if self.entries.iter().any(|e| e.id == id) {
            return;
        }
        self.entries.push(OperatorEntry {
            id,
            name: name.into(),
        });
    }

    /// Look up an operator by exact id match.
    pub fn by_id(&self, id: &str) -> Option<&OperatorEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Resolve an IMSI to the operator whose stored id is a prefix of it.
    /// When several stored ids prefix-match, the one added earliest wins.
    pub fn by_imsi_prefix(&self, imsi: &str) -> Option<&OperatorEntry> {
        self.entries.iter().find(|e| imsi.starts_with(&e.id))
    }

    /// Drop every entry — called on SIM loss.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_is_ignored() {
        let mut t = OperatorTable::new();
        t.insert("26201", "T-Mobile DE");
        t.insert("26201", "Something Else");
        assert_eq!(t.by_id("26201").unwrap().name, "T-Mobile DE");
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn prefix_match_prefers_first_added_on_ambiguity() {
        let mut t = OperatorTable::new();
        t.insert("26201", "Five Digit Co");
        t.insert("262011", "Six Digit Co");
        let hit = t.by_imsi_prefix("262011234567890").unwrap();
        assert_eq!(hit.name, "Five Digit Co");
    }

    #[test]
    fn clear_drops_all_entries() {
        let mut t = OperatorTable::new();
        t.insert("26201", "T-Mobile DE");
        t.clear();
        assert!(t.is_empty());
    }
}
