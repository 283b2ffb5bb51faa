//! Grid controller
//!
//! Owns one page's view state over a snapshot of records:
//!
//! - Records: read-only snapshot handed in by the caller
//! - Filter/Sort/Visibility: mutated only through setters, reset by `reset()`
//! - Visible list: derived (filter, then stable sort), never mutated directly
//! - Selection: pruned against the visible list on every derivation
//!
//! Setters that name a bad column return `ColumnError` and leave every
//! piece of state as it was.

use std::collections::HashSet;

use crate::column::{Column, ColumnRegistry, RecordType};
use crate::error::ColumnError;
use crate::filter::{FilterState, FilterValue};
use crate::record::{Record, RecordId};
use crate::selection::SelectionSet;
use crate::sort::SortState;

#[derive(Debug, Clone)]
pub struct GridController {
    registry: ColumnRegistry,
    records: Vec<Record>,
    filters: FilterState,
    sort: SortState,
    visible_columns: HashSet<String>,
    selection: SelectionSet,

    // Derived: positions into `records`, filtered + sorted
    visible_rows: Vec<usize>,
    // Derived: ids of `visible_rows`, same order
    visible_ids: Vec<RecordId>,
}

impl GridController {
    pub fn new(registry: ColumnRegistry, records: Vec<Record>) -> Self {
        let visible_columns = registry.default_visible();
        let mut controller = Self {
            registry,
            records,
            filters: FilterState::new(),
            sort: SortState::new(),
            visible_columns,
            selection: SelectionSet::new(),
            visible_rows: Vec::new(),
            visible_ids: Vec::new(),
        };
        controller.rederive();
        controller
    }

    /// Controller over one of the built-in registries
    pub fn for_record_type(record_type: RecordType, records: Vec<Record>) -> Self {
        Self::new(record_type.registry(), records)
    }

    pub fn registry(&self) -> &ColumnRegistry {
        &self.registry
    }

    /// Replace the record snapshot (after a store round trip).
    pub fn set_records(&mut self, records: Vec<Record>) {
        self.records = records;
        self.rederive();
    }

    /// Full snapshot, unfiltered
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, id: &RecordId) -> Option<&Record> {
        self.records.iter().find(|r| &r.id == id)
    }

    // ------------------------------------------------------------------------
    // Column visibility
    // ------------------------------------------------------------------------

    /// Visible columns in registry order
    pub fn visible_columns(&self) -> Vec<&Column> {
        self.registry
            .columns()
            .iter()
            .filter(|c| self.visible_columns.contains(&c.id))
            .collect()
    }

    /// Ids of hidden columns in registry order
    pub fn hidden_columns(&self) -> Vec<String> {
        self.registry
            .columns()
            .iter()
            .filter(|c| !self.visible_columns.contains(&c.id))
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn is_column_visible(&self, column_id: &str) -> bool {
        self.visible_columns.contains(column_id)
    }

    pub fn set_column_visible(&mut self, column_id: &str, visible: bool) -> Result<(), ColumnError> {
        if !self.registry.contains(column_id) {
            return Err(self.ignored(ColumnError::Unknown(column_id.to_string())));
        }
        if visible {
            self.visible_columns.insert(column_id.to_string());
        } else {
            self.visible_columns.remove(column_id);
        }
        Ok(())
    }

    pub fn toggle_column(&mut self, column_id: &str) -> Result<(), ColumnError> {
        let visible = self.is_column_visible(column_id);
        self.set_column_visible(column_id, !visible)
    }

    /// Hide a list of columns (e.g. from saved settings). Unknown ids are
    /// skipped.
    pub fn hide_columns<S: AsRef<str>>(&mut self, column_ids: &[S]) {
        for id in column_ids {
            let _ = self.set_column_visible(id.as_ref(), false);
        }
    }

    pub fn show_all_columns(&mut self) {
        self.visible_columns = self
            .registry
            .columns()
            .iter()
            .map(|c| c.id.clone())
            .collect();
    }

    // ------------------------------------------------------------------------
    // Filter / Sort
    // ------------------------------------------------------------------------

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn set_filter(&mut self, column_id: &str, value: FilterValue) -> Result<(), ColumnError> {
        if let Err(e) = self.filters.update(&self.registry, column_id, value) {
            return Err(self.ignored(e));
        }
        self.rederive();
        Ok(())
    }

    pub fn clear_filter(&mut self, column_id: &str) {
        self.filters.clear_column(column_id);
        self.rederive();
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.rederive();
    }

    pub fn active_filter_count(&self) -> usize {
        self.filters.active_count()
    }

    pub fn sort(&self) -> &SortState {
        &self.sort
    }

    pub fn set_sort(&mut self, column_id: &str) -> Result<(), ColumnError> {
        if let Err(e) = self.sort.set_sort(&self.registry, column_id) {
            return Err(self.ignored(e));
        }
        self.rederive();
        Ok(())
    }

    pub fn clear_sort(&mut self) {
        self.sort.clear();
        self.rederive();
    }

    /// Restore default filters, sort and column visibility. Selection is
    /// kept where the ids are still visible.
    pub fn reset(&mut self) {
        self.filters.clear();
        self.sort.clear();
        self.visible_columns = self.registry.default_visible();
        self.rederive();
    }

    // ------------------------------------------------------------------------
    // Visible list
    // ------------------------------------------------------------------------

    /// Filtered and sorted records, in display order
    pub fn visible_records(&self) -> Vec<&Record> {
        self.visible_rows.iter().map(|&i| &self.records[i]).collect()
    }

    pub fn visible_ids(&self) -> &[RecordId] {
        &self.visible_ids
    }

    pub fn visible_len(&self) -> usize {
        self.visible_rows.len()
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    pub fn toggle_selection(&mut self, id: &RecordId) {
        self.selection.toggle(id, &self.visible_ids);
    }

    pub fn toggle_select_all(&mut self) {
        self.selection.toggle_select_all(&self.visible_ids);
    }

    pub fn select_all(&mut self) {
        self.selection.select_all(&self.visible_ids);
    }

    pub fn deselect_all(&mut self) {
        self.selection.deselect_all();
    }

    pub fn is_selected(&self, id: &RecordId) -> bool {
        self.selection.is_selected(id)
    }

    pub fn is_all_selected(&self) -> bool {
        self.selection.is_all_selected(&self.visible_ids)
    }

    pub fn is_some_selected(&self) -> bool {
        self.selection.is_some_selected(&self.visible_ids)
    }

    pub fn selection_len(&self) -> usize {
        self.selection.len()
    }

    /// Selected ids in visible order
    pub fn selected_ids(&self) -> Vec<RecordId> {
        self.selection.ordered(&self.visible_ids)
    }

    // ------------------------------------------------------------------------
    // Derivation
    // ------------------------------------------------------------------------

    fn rederive(&mut self) {
        let mut rows = self.filters.apply_indices(&self.registry, &self.records);
        self.sort.sort_indices(&self.registry, &self.records, &mut rows);

        self.visible_ids = rows.iter().map(|&i| self.records[i].id.clone()).collect();
        self.visible_rows = rows;

        let dropped = self.selection.prune(&self.visible_ids);
        if !dropped.is_empty() {
            log::debug!(
                "{}: pruned {} selected id(s) no longer visible",
                self.registry.name(),
                dropped.len()
            );
        }
    }

    fn ignored(&self, err: ColumnError) -> ColumnError {
        log::debug!("{}: ignoring setter call: {}", self.registry.name(), err);
        err
    }
}

// =============================================================================
// Tests
// =============================================================================
