//! Filter Engine
//!
//! One predicate per filterable column, ANDed together. Filtering never
//! mutates its input and is idempotent: applying the same state to its own
//! output returns that output unchanged.
//!
//! Predicates by kind:
//! - text: case-insensitive substring
//! - enum: case-insensitive exact match
//! - integer/currency/percentage: inclusive range, either bound open
//! - date: inclusive calendar-day range, either bound open
//!
//! Values that can't be read as the column's kind FAIL an active predicate.
//! For dates this is the important case: a malformed date must never leak
//! a row through a range filter.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnKind, ColumnRegistry};
use crate::error::ColumnError;
use crate::record::Record;
use crate::value::Value;

// =============================================================================
// FilterValue
// =============================================================================

/// Filter value for one column
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum FilterValue {
    /// No constraint
    #[default]
    Any,
    /// Substring (text) or exact choice (enum). Empty or "all" means no
    /// constraint.
    Match { value: String },
    /// Inclusive numeric range
    Range { min: Option<f64>, max: Option<f64> },
    /// Inclusive date range
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

impl FilterValue {
    pub fn matching(value: impl Into<String>) -> Self {
        FilterValue::Match { value: value.into() }
    }

    pub fn range(min: Option<f64>, max: Option<f64>) -> Self {
        FilterValue::Range { min, max }
    }

    pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        FilterValue::DateRange { from, to }
    }

    /// Does this value constrain anything?
    pub fn is_active(&self) -> bool {
        match self {
            FilterValue::Any => false,
            FilterValue::Match { value } => {
                let v = value.trim();
                !v.is_empty() && !v.eq_ignore_ascii_case("all")
            }
            FilterValue::Range { min, max } => min.is_some() || max.is_some(),
            FilterValue::DateRange { from, to } => from.is_some() || to.is_some(),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            FilterValue::Any => "any",
            FilterValue::Match { .. } => "match",
            FilterValue::Range { .. } => "range",
            FilterValue::DateRange { .. } => "date range",
        }
    }

    /// Is this filter shape meaningful for the column kind?
    fn fits(&self, kind: &ColumnKind) -> bool {
        match self {
            FilterValue::Any => true,
            FilterValue::Match { .. } => matches!(kind, ColumnKind::Text | ColumnKind::Enum(_)),
            FilterValue::Range { .. } => kind.is_numeric(),
            FilterValue::DateRange { .. } => matches!(kind, ColumnKind::Date),
        }
    }

    /// Evaluate against one cell. `None` (field absent) is read as blank.
    pub fn passes(&self, kind: &ColumnKind, value: Option<&Value>) -> bool {
        if !self.is_active() {
            return true;
        }
        let blank = Value::default();
        let value = value.unwrap_or(&blank);

        match self {
            FilterValue::Any => true,
            FilterValue::Match { value: needle } => {
                let needle = needle.trim().to_lowercase();
                let haystack = value.as_text().trim().to_lowercase();
                match kind {
                    ColumnKind::Enum(_) => haystack == needle,
                    _ => haystack.contains(&needle),
                }
            }
            FilterValue::Range { min, max } => {
                let Some(n) = value.as_number() else {
                    return false;
                };
                min.map_or(true, |lo| n >= lo) && max.map_or(true, |hi| n <= hi)
            }
            FilterValue::DateRange { from, to } => {
                let Some(dt) = value.as_datetime() else {
                    return false;
                };
                let day = dt.date();
                from.map_or(true, |f| day >= f) && to.map_or(true, |t| day <= t)
            }
        }
    }
}

// =============================================================================
// FilterState
// =============================================================================

/// Active filter values keyed by column id.
///
/// Only filterable columns ever hold an entry, and only active values are
/// stored, so `active_count()` is just the map size.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    filters: HashMap<String, FilterValue>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the filter for a column.
    ///
    /// Unknown or non-filterable columns, and filter shapes that don't fit
    /// the column's kind, are rejected and leave the state unchanged. An
    /// inactive value clears the column.
    pub fn update(
        &mut self,
        registry: &ColumnRegistry,
        column_id: &str,
        value: FilterValue,
    ) -> Result<(), ColumnError> {
        let column = registry
            .get(column_id)
            .ok_or_else(|| ColumnError::Unknown(column_id.to_string()))?;
        if !column.filterable {
            return Err(ColumnError::NotFilterable(column_id.to_string()));
        }
        if !value.fits(&column.kind) {
            return Err(ColumnError::FilterMismatch {
                column: column_id.to_string(),
                kind: column.kind.name(),
                filter: value.shape(),
            });
        }

        if value.is_active() {
            self.filters.insert(column_id.to_string(), value);
        } else {
            self.filters.remove(column_id);
        }
        Ok(())
    }

    /// Reset one column to "no constraint"
    pub fn clear_column(&mut self, column_id: &str) {
        self.filters.remove(column_id);
    }

    /// Reset every column to "no constraint"
    pub fn clear(&mut self) {
        self.filters.clear();
    }

    /// Current value for a column (`Any` when unconstrained)
    pub fn get(&self, column_id: &str) -> &FilterValue {
        static ANY: FilterValue = FilterValue::Any;
        self.filters.get(column_id).unwrap_or(&ANY)
    }

    /// Number of constrained columns (badge count, gates "Clear filters")
    pub fn active_count(&self) -> usize {
        self.filters.len()
    }

    pub fn is_active(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Does a record satisfy every active predicate?
    pub fn matches(&self, registry: &ColumnRegistry, record: &Record) -> bool {
        self.filters.iter().all(|(column_id, value)| {
            // Entries are only ever inserted for registry columns
            let Some(column) = registry.get(column_id) else {
                return true;
            };
            passes_column(column, value, record)
        })
    }

    /// Indices of records that pass, in input order
    pub fn apply_indices(&self, registry: &ColumnRegistry, records: &[Record]) -> Vec<usize> {
        records
            .iter()
            .enumerate()
            .filter(|(_, r)| self.matches(registry, r))
            .map(|(i, _)| i)
            .collect()
    }

    /// Records that pass, in input order
    pub fn apply(&self, registry: &ColumnRegistry, records: &[Record]) -> Vec<Record> {
        records
            .iter()
            .filter(|r| self.matches(registry, r))
            .cloned()
            .collect()
    }
}

fn passes_column(column: &Column, value: &FilterValue, record: &Record) -> bool {
    value.passes(&column.kind, record.get(&column.id))
}

// =============================================================================
// Tests
// =============================================================================
