//! Sort Engine
//!
//! One active sort column and a direction. Keys are typed by column kind
//! and the sort is stable, so equal keys keep their input order in BOTH
//! directions (direction flips the comparison, never the list). Missing
//! values sort last regardless of direction.

use std::cmp::Ordering;

use chrono::NaiveDateTime;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::column::{Column, ColumnKind, ColumnRegistry};
use crate::error::ColumnError;
use crate::record::Record;
use crate::value::Value;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

// =============================================================================
// SortKey
// =============================================================================

/// Typed key for one cell
#[derive(Debug, Clone, PartialEq, Eq)]
enum SortKey {
    Number(OrderedFloat<f64>),
    Date(NaiveDateTime),
    /// Trimmed, lowercased, Latin accents folded (see [`text_key`])
    Text(String),
    /// Blank, NaN, or unparsable for the column's kind
    Missing,
}

impl SortKey {
    fn for_column(column: &Column, value: Option<&Value>) -> Self {
        let Some(value) = value else {
            return SortKey::Missing;
        };
        if value.is_blank() {
            return SortKey::Missing;
        }
        match &column.kind {
            ColumnKind::Integer | ColumnKind::Currency | ColumnKind::Percentage => value
                .as_number()
                .map(|n| SortKey::Number(OrderedFloat(n)))
                .unwrap_or(SortKey::Missing),
            ColumnKind::Date => value
                .as_datetime()
                .map(SortKey::Date)
                .unwrap_or(SortKey::Missing),
            ColumnKind::Text | ColumnKind::Enum(_) => SortKey::Text(text_key(&value.as_text())),
        }
    }

    fn is_missing(&self) -> bool {
        matches!(self, SortKey::Missing)
    }

    /// Compare present keys of the same column. Keys of one column always
    /// share a variant, so cross-variant pairs compare equal.
    fn cmp_present(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// Collation key for text cells.
///
/// Case-insensitive, with accented Latin letters ordered next to their base
/// letter ("éclair" before "zebra"). Anything else compares by code point.
fn text_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    for c in text.trim().chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => key.push('a'),
            'ç' | 'ć' | 'č' => key.push('c'),
            'ď' | 'đ' => key.push('d'),
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => key.push('e'),
            'ğ' => key.push('g'),
            'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' | 'ı' => key.push('i'),
            'ł' => key.push('l'),
            'ñ' | 'ń' | 'ň' => key.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => key.push('o'),
            'ř' => key.push('r'),
            'ś' | 'š' | 'ş' => key.push('s'),
            'ť' | 'ţ' => key.push('t'),
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => key.push('u'),
            'ý' | 'ÿ' => key.push('y'),
            'ź' | 'ż' | 'ž' => key.push('z'),
            'ß' => key.push_str("ss"),
            'æ' => key.push_str("ae"),
            'œ' => key.push_str("oe"),
            other => key.push(other),
        }
    }
    key
}

/// Order two keys: missing last, direction applied to present keys only.
fn compare_keys(a: &SortKey, b: &SortKey, direction: SortDirection) -> Ordering {
    match (a.is_missing(), b.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ord = a.cmp_present(b);
            match direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

// =============================================================================
// SortState
// =============================================================================

/// Current sort: `field = None` means input order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortState {
    pub field: Option<String>,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same column flips the direction; a new column starts ascending.
    /// Unknown and non-sortable columns leave the state unchanged.
    pub fn set_sort(&mut self, registry: &ColumnRegistry, column_id: &str) -> Result<(), ColumnError> {
        let column = registry
            .get(column_id)
            .ok_or_else(|| ColumnError::Unknown(column_id.to_string()))?;
        if !column.sortable {
            return Err(ColumnError::NotSortable(column_id.to_string()));
        }

        if self.field.as_deref() == Some(column_id) {
            self.direction = self.direction.toggled();
        } else {
            self.field = Some(column_id.to_string());
            self.direction = SortDirection::Asc;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_active(&self) -> bool {
        self.field.is_some()
    }

    /// Reorder `indices` (positions into `records`) in place.
    pub fn sort_indices(&self, registry: &ColumnRegistry, records: &[Record], indices: &mut [usize]) {
        let Some(column) = self.field.as_deref().and_then(|id| registry.get(id)) else {
            return;
        };

        // Precompute keys, then stable-sort (key, original position) pairs
        let mut keyed: Vec<(SortKey, usize)> = indices
            .iter()
            .map(|&i| (SortKey::for_column(column, records[i].get(&column.id)), i))
            .collect();
        keyed.sort_by(|a, b| compare_keys(&a.0, &b.0, self.direction));

        for (slot, (_, i)) in indices.iter_mut().zip(keyed) {
            *slot = i;
        }
    }

    /// Positions of `records` in sorted order
    pub fn apply_indices(&self, registry: &ColumnRegistry, records: &[Record]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..records.len()).collect();
        self.sort_indices(registry, records, &mut indices);
        indices
    }

    /// Sorted copy of `records`
    pub fn apply(&self, registry: &ColumnRegistry, records: &[Record]) -> Vec<Record> {
        self.apply_indices(registry, records)
            .into_iter()
            .map(|i| records[i].clone())
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
