//! Sheet schemas declared in TOML
//!
//! Lets a deployment define its own sheet (a site-specific Master Data
//! Sheet, say) without touching the built-in registries:
//!
//! ```toml
//! name = "lab_catalog"
//! key = "lab_code"
//! status = "stage"
//!
//! [[columns]]
//! id = "lab_code"
//! label = "Lab Code"
//! kind = "text"
//! required = true
//!
//! [[columns]]
//! id = "stage"
//! label = "Stage"
//! kind = "enum"
//! values = ["Draft", "Published"]
//! ```

use std::collections::HashSet;

use serde::Deserialize;

use crate::column::{Column, ColumnKind, ColumnRegistry};
use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Raw TOML shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SheetSchema {
    name: String,
    key: String,
    #[serde(default)]
    status: Option<String>,
    columns: Vec<ColumnSchema>,
}

#[derive(Debug, Deserialize)]
struct ColumnSchema {
    id: String,
    label: String,
    kind: KindName,
    #[serde(default)]
    values: Vec<String>,
    #[serde(default = "default_true")]
    sortable: bool,
    #[serde(default = "default_true")]
    filterable: bool,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KindName {
    Text,
    Integer,
    Currency,
    Percentage,
    Date,
    Enum,
}

fn default_true() -> bool {
    true
}

impl ColumnSchema {
    fn into_column(self) -> Column {
        let kind = match self.kind {
            KindName::Text => ColumnKind::Text,
            KindName::Integer => ColumnKind::Integer,
            KindName::Currency => ColumnKind::Currency,
            KindName::Percentage => ColumnKind::Percentage,
            KindName::Date => ColumnKind::Date,
            KindName::Enum => ColumnKind::Enum(self.values),
        };
        Column {
            id: self.id,
            label: self.label,
            kind,
            sortable: self.sortable,
            filterable: self.filterable,
            default_visible: self.visible,
            required: self.required,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ColumnRegistry {
    /// Build a registry from parts, checking it is well formed.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<Column>,
        key_column: impl Into<String>,
        status_column: Option<String>,
    ) -> Result<Self, SchemaError> {
        let registry = Self {
            name: name.into(),
            columns,
            key_column: key_column.into(),
            status_column,
        };
        registry.check()?;
        Ok(registry)
    }

    pub fn from_toml(input: &str) -> Result<Self, SchemaError> {
        let schema: SheetSchema =
            toml::from_str(input).map_err(|e| SchemaError::Parse(e.to_string()))?;
        let columns = schema
            .columns
            .into_iter()
            .map(ColumnSchema::into_column)
            .collect();
        Self::new(schema.name, columns, schema.key, schema.status)
    }

    /// Unique ids, declared key/status columns, status is an enum, no
    /// empty enums.
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns(self.name.clone()));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.id.as_str()) {
                return Err(SchemaError::DuplicateColumn(column.id.clone()));
            }
            if let ColumnKind::Enum(values) = &column.kind {
                if values.is_empty() {
                    return Err(SchemaError::EmptyEnum(column.id.clone()));
                }
            }
        }

        if !self.contains(&self.key_column) {
            return Err(SchemaError::UnknownKeyColumn(self.key_column.clone()));
        }

        if let Some(status) = &self.status_column {
            match self.get(status) {
                None => return Err(SchemaError::UnknownStatusColumn(status.clone())),
                Some(c) if c.kind.enum_values().is_none() => {
                    return Err(SchemaError::StatusNotEnum(status.clone()))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"
name = "lab_catalog"
key = "lab_code"
status = "stage"

[[columns]]
id = "lab_code"
label = "Lab Code"
kind = "text"
required = true

[[columns]]
id = "stage"
label = "Stage"
kind = "enum"
values = ["Draft", "Published", "Retired"]

[[columns]]
id = "hours"
label = "Hours"
kind = "integer"
visible = false

[[columns]]
id = "summary"
label = "Summary"
kind = "text"
sortable = false
filterable = false
"#;

    #[test]
    fn parse_catalog_schema() {
        let registry = ColumnRegistry::from_toml(CATALOG).unwrap();
        assert_eq!(registry.name(), "lab_catalog");
        assert_eq!(registry.columns().len(), 4);
        assert_eq!(registry.key_column().id, "lab_code");
        assert!(registry.key_column().required);

        let stage = registry.status_column().unwrap();
        assert_eq!(stage.kind.enum_values().unwrap().len(), 3);

        let hours = registry.get("hours").unwrap();
        assert_eq!(hours.kind, ColumnKind::Integer);
        assert!(!hours.default_visible);
        assert!(hours.sortable);

        let summary = registry.get("summary").unwrap();
        assert!(!summary.sortable);
        assert!(!summary.filterable);
    }

    #[test]
    fn reject_duplicate_ids() {
        let input = r#"
name = "dup"
key = "a"
[[columns]]
id = "a"
label = "A"
kind = "text"
[[columns]]
id = "a"
label = "A again"
kind = "integer"
"#;
        let err = ColumnRegistry::from_toml(input).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateColumn("a".into()));
    }

    #[test]
    fn reject_unknown_key() {
        let input = r#"
name = "nokey"
key = "code"
[[columns]]
id = "a"
label = "A"
kind = "text"
"#;
        let err = ColumnRegistry::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("'code'"));
    }

    #[test]
    fn reject_non_enum_status() {
        let input = r#"
name = "bad_status"
key = "a"
status = "a"
[[columns]]
id = "a"
label = "A"
kind = "text"
"#;
        let err = ColumnRegistry::from_toml(input).unwrap_err();
        assert_eq!(err, SchemaError::StatusNotEnum("a".into()));
    }

    #[test]
    fn reject_empty_enum() {
        let input = r#"
name = "empty_enum"
key = "a"
[[columns]]
id = "a"
label = "A"
kind = "enum"
"#;
        let err = ColumnRegistry::from_toml(input).unwrap_err();
        assert_eq!(err, SchemaError::EmptyEnum("a".into()));
    }

    #[test]
    fn reject_unknown_kind() {
        let input = r#"
name = "typo"
key = "a"
[[columns]]
id = "a"
label = "A"
kind = "txt"
"#;
        assert!(matches!(
            ColumnRegistry::from_toml(input),
            Err(SchemaError::Parse(_))
        ));
    }
}
