use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Field values keyed by column id
pub type Fields = BTreeMap<String, Value>;

/// Opaque record identifier assigned by the record store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One row of business data.
///
/// Owned by the record store; the grid only ever holds a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>, fields: Fields, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            fields,
            created_at,
        }
    }

    /// Value for a column; `None` only for columns the record was never given
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
