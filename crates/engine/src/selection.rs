//! Selection Set
//!
//! Ids of selected records. Membership is always checked against the
//! current visible list: ids that fall out of view are pruned on every
//! derivation pass.

use std::collections::HashSet;

use crate::record::RecordId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: HashSet<RecordId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one id. Ids outside the visible list are ignored.
    pub fn toggle(&mut self, id: &RecordId, visible: &[RecordId]) {
        if !visible.contains(id) {
            log::debug!("selection: ignoring toggle of non-visible id {}", id);
            return;
        }
        if !self.ids.remove(id) {
            self.ids.insert(id.clone());
        }
    }

    /// Select every visible id
    pub fn select_all(&mut self, visible: &[RecordId]) {
        self.ids.extend(visible.iter().cloned());
    }

    pub fn deselect_all(&mut self) {
        self.ids.clear();
    }

    /// Select every visible id unless all already are, then clear.
    pub fn toggle_select_all(&mut self, visible: &[RecordId]) {
        if self.is_all_selected(visible) {
            self.deselect_all();
        } else {
            self.select_all(visible);
        }
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.ids.contains(id)
    }

    /// True iff the visible list is non-empty and fully selected
    pub fn is_all_selected(&self, visible: &[RecordId]) -> bool {
        !visible.is_empty() && self.ids.len() == visible.len()
    }

    /// Indeterminate: something selected, but not everything
    pub fn is_some_selected(&self, visible: &[RecordId]) -> bool {
        !self.ids.is_empty() && !self.is_all_selected(visible)
    }

    /// Drop ids not in `visible`; returns the dropped ids.
    pub fn prune(&mut self, visible: &[RecordId]) -> Vec<RecordId> {
        if self.ids.is_empty() {
            return Vec::new();
        }
        let keep: HashSet<&RecordId> = visible.iter().collect();
        let dropped: Vec<RecordId> = self
            .ids
            .iter()
            .filter(|id| !keep.contains(id))
            .cloned()
            .collect();
        for id in &dropped {
            self.ids.remove(id);
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Selected ids in the order they appear in `visible`
    pub fn ordered(&self, visible: &[RecordId]) -> Vec<RecordId> {
        visible
            .iter()
            .filter(|id| self.ids.contains(*id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<RecordId> {
        names.iter().map(|n| RecordId::from(*n)).collect()
    }

    #[test]
    fn test_toggle() {
        let visible = ids(&["a", "b", "c"]);
        let mut sel = SelectionSet::new();

        sel.toggle(&"b".into(), &visible);
        assert!(sel.is_selected(&"b".into()));
        assert!(sel.is_some_selected(&visible));

        sel.toggle(&"b".into(), &visible);
        assert!(sel.is_empty());

        // Not visible: ignored
        sel.toggle(&"z".into(), &visible);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_toggle_select_all() {
        let visible = ids(&["a", "b", "c"]);
        let mut sel = SelectionSet::new();
        sel.toggle(&"a".into(), &visible);

        // Partial selection -> select everything
        sel.toggle_select_all(&visible);
        assert_eq!(sel.len(), 3);
        assert!(sel.is_all_selected(&visible));
        assert!(!sel.is_some_selected(&visible));

        sel.toggle_select_all(&visible);
        assert_eq!(sel.len(), 0);
    }

    #[test]
    fn test_empty_visible_is_never_all_selected() {
        let sel = SelectionSet::new();
        assert!(!sel.is_all_selected(&[]));
        assert!(!sel.is_some_selected(&[]));
    }

    #[test]
    fn test_prune_returns_dropped() {
        let mut sel = SelectionSet::new();
        sel.select_all(&ids(&["a", "b", "c"]));

        let mut dropped = sel.prune(&ids(&["c", "a"]));
        dropped.sort();
        assert_eq!(dropped, ids(&["b"]));
        assert_eq!(sel.ordered(&ids(&["c", "x", "a"])), ids(&["c", "a"]));
    }
}
