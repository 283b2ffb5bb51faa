//! Column Registry
//!
//! Declares the ordered set of columns for a record type. The registry is
//! built once per grid and never changes afterwards: hiding or reordering
//! columns on screen never changes an id.
//!
//! The column `kind` is the single switch that filters, sort comparators,
//! validators and the codec all dispatch on.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record::Fields;
use crate::value::{format_number, parse_date, Value};

// =============================================================================
// ColumnKind
// =============================================================================

/// Data kind of a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Integer,
    Currency,
    Percentage,
    Date,
    /// Enumerated choice; allowed values in display order
    Enum(Vec<String>),
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Currency => "currency",
            ColumnKind::Percentage => "percentage",
            ColumnKind::Date => "date",
            ColumnKind::Enum(_) => "enum",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ColumnKind::Integer | ColumnKind::Currency | ColumnKind::Percentage
        )
    }

    pub fn enum_values(&self) -> Option<&[String]> {
        match self {
            ColumnKind::Enum(values) => Some(values),
            _ => None,
        }
    }

    /// Value a new record gets when the column is left out
    pub fn default_value(&self) -> Value {
        Value::Text(String::new())
    }

    /// Example cell for the import template
    pub fn example_value(&self) -> String {
        match self {
            ColumnKind::Text => "Example".to_string(),
            ColumnKind::Integer => "10".to_string(),
            ColumnKind::Currency => "1500.00".to_string(),
            ColumnKind::Percentage => "12.5".to_string(),
            ColumnKind::Date => "2026-01-31".to_string(),
            ColumnKind::Enum(values) => values.first().cloned().unwrap_or_default(),
        }
    }
}

// =============================================================================
// Column
// =============================================================================

/// Column descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub label: String,
    pub kind: ColumnKind,
    pub sortable: bool,
    pub filterable: bool,
    pub default_visible: bool,
    /// Must be non-blank on insert and import
    pub required: bool,
}

impl Column {
    /// Sortable, filterable, visible, optional
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            sortable: true,
            filterable: true,
            default_visible: true,
            required: false,
        }
    }

    pub fn with_sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn with_filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn hidden_by_default(mut self) -> Self {
        self.default_visible = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Check a raw value against this column and normalise it.
    ///
    /// - integer: whole number
    /// - currency/percentage: any finite number
    /// - date: parsable ISO date or date-time (kept as given, trimmed)
    /// - enum: case-insensitive match, rewritten to the declared spelling
    ///
    /// Blank passes for optional columns and fails for required ones.
    pub fn validate(&self, value: &Value) -> Result<Value, ValidationError> {
        if value.is_blank() {
            if self.required {
                return Err(ValidationError::new(&self.id, "a value is required"));
            }
            return Ok(self.kind.default_value());
        }

        match &self.kind {
            ColumnKind::Text => Ok(Value::Text(value.as_text().trim().to_string())),
            ColumnKind::Integer => match value.as_number() {
                Some(n) if n.fract() == 0.0 => Ok(Value::Number(n)),
                _ => Err(ValidationError::new(
                    &self.id,
                    format!("expected a whole number, got '{}'", value.as_text()),
                )),
            },
            ColumnKind::Currency | ColumnKind::Percentage => match value.as_number() {
                Some(n) => Ok(Value::Number(n)),
                None => Err(ValidationError::new(
                    &self.id,
                    format!("expected a number, got '{}'", value.as_text()),
                )),
            },
            ColumnKind::Date => {
                let text = value.as_text();
                match parse_date(&text) {
                    Some(_) => Ok(Value::Text(text.trim().to_string())),
                    None => Err(ValidationError::new(
                        &self.id,
                        format!("expected a yyyy-mm-dd date, got '{}'", text),
                    )),
                }
            }
            ColumnKind::Enum(values) => {
                let text = value.as_text();
                let wanted = text.trim().to_lowercase();
                values
                    .iter()
                    .find(|v| v.to_lowercase() == wanted)
                    .map(|v| Value::Text(v.clone()))
                    .ok_or_else(|| {
                        ValidationError::new(
                            &self.id,
                            format!("'{}' is not one of: {}", text.trim(), values.join(", ")),
                        )
                    })
            }
        }
    }

    /// Render a value as flat export text.
    ///
    /// Currency without symbol (two decimals), percentage as a bare number,
    /// dates as `yyyy-mm-dd`. Values that don't fit the kind are written
    /// as-is so nothing is silently lost.
    pub fn render(&self, value: Option<&Value>) -> String {
        let Some(value) = value else {
            return String::new();
        };
        if value.is_blank() {
            return String::new();
        }
        match &self.kind {
            ColumnKind::Integer | ColumnKind::Percentage => match value.as_number() {
                Some(n) => format_number(n),
                None => value.as_text().into_owned(),
            },
            ColumnKind::Currency => match value.as_number() {
                Some(n) => format!("{:.2}", n),
                None => value.as_text().into_owned(),
            },
            ColumnKind::Date => match parse_date(&value.as_text()) {
                Some(d) => d.format("%Y-%m-%d").to_string(),
                None => value.as_text().into_owned(),
            },
            ColumnKind::Text | ColumnKind::Enum(_) => value.as_text().into_owned(),
        }
    }

    /// Does an untrusted header cell name this column? (label or id,
    /// trimmed, case-insensitive)
    pub fn matches_header(&self, header: &str) -> bool {
        let h = normalize_header(header);
        h == normalize_header(&self.label) || h == normalize_header(&self.id)
    }
}

/// Header normalisation shared by the registry and the import path
pub fn normalize_header(header: &str) -> String {
    header.trim_start_matches('\u{feff}').trim().to_lowercase()
}

// =============================================================================
// RecordType
// =============================================================================

/// Built-in record types, one per spreadsheet page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    /// Lab solution requests (quoting)
    Solution,
    /// Downstream lab delivery
    Delivery,
    /// Lab template master data
    MasterData,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Solution => "solutions",
            RecordType::Delivery => "delivery",
            RecordType::MasterData => "master_data",
        }
    }

    /// Built-in column registry for this record type
    pub fn registry(&self) -> ColumnRegistry {
        match self {
            RecordType::Solution => solution_registry(),
            RecordType::Delivery => delivery_registry(),
            RecordType::MasterData => master_data_registry(),
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered columns for a built-in record type
pub fn get_columns(record_type: RecordType) -> Vec<Column> {
    record_type.registry().columns
}

// =============================================================================
// ColumnRegistry
// =============================================================================

/// The fixed, ordered column set of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRegistry {
    pub(crate) name: String,
    pub(crate) columns: Vec<Column>,
    /// Natural key; rows without it are never imported
    pub(crate) key_column: String,
    /// Column that bulk status changes write to
    pub(crate) status_column: Option<String>,
}

impl ColumnRegistry {
    /// Sheet name (e.g. "solutions")
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    pub fn key_column(&self) -> &Column {
        // Checked at construction
        self.get(&self.key_column).unwrap_or(&self.columns[0])
    }

    pub fn status_column(&self) -> Option<&Column> {
        self.status_column.as_deref().and_then(|id| self.get(id))
    }

    /// Ids of columns visible by default
    pub fn default_visible(&self) -> HashSet<String> {
        self.columns
            .iter()
            .filter(|c| c.default_visible)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Resolve an untrusted header (CSV/XLSX) to a column; unknown headers
    /// resolve to `None` rather than failing.
    pub fn resolve_header(&self, header: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.matches_header(header))
    }

    /// Validate a full payload for insert.
    ///
    /// Unknown keys are dropped, absent optional columns get their kind's
    /// default, absent or blank required columns fail.
    pub fn validate_payload(&self, payload: &Fields) -> Result<Fields, ValidationError> {
        for key in payload.keys() {
            if !self.contains(key) {
                log::debug!("{}: dropping unknown field '{}'", self.name, key);
            }
        }

        let mut out = Fields::new();
        for column in &self.columns {
            let value = match payload.get(&column.id) {
                Some(v) => column.validate(v)?,
                None if column.required => {
                    return Err(ValidationError::new(&column.id, "a value is required"));
                }
                None => column.kind.default_value(),
            };
            out.insert(column.id.clone(), value);
        }
        Ok(out)
    }

    /// Validate a partial update; every key must name a declared column.
    pub fn validate_patch(&self, patch: &Fields) -> Result<Fields, ValidationError> {
        let mut out = Fields::new();
        for (key, value) in patch {
            let column = self
                .get(key)
                .ok_or_else(|| ValidationError::new(key, "no such column"))?;
            out.insert(key.clone(), column.validate(value)?);
        }
        Ok(out)
    }
}

// =============================================================================
// Built-in registries
// =============================================================================

fn enum_kind(values: &[&str]) -> ColumnKind {
    ColumnKind::Enum(values.iter().map(|v| v.to_string()).collect())
}

pub const SOLUTION_STATUSES: &[&str] = &[
    "Pending",
    "In Progress",
    "Quoted",
    "Approved",
    "Rejected",
    "Completed",
];

pub const DELIVERY_STATUSES: &[&str] = &[
    "Scheduled",
    "Provisioning",
    "Live",
    "Completed",
    "Cancelled",
];

fn solution_registry() -> ColumnRegistry {
    ColumnRegistry {
        name: RecordType::Solution.as_str().to_string(),
        columns: vec![
            Column::new("lab_name", "Lab Name", ColumnKind::Text).required(),
            Column::new("client", "Client", ColumnKind::Text),
            Column::new("requested_by", "Requested By", ColumnKind::Text),
            Column::new("status", "Status", enum_kind(SOLUTION_STATUSES)),
            Column::new("seats", "Seats", ColumnKind::Integer),
            Column::new("quote_value", "Quote Value", ColumnKind::Currency),
            Column::new("margin", "Margin %", ColumnKind::Percentage),
            Column::new("requested_on", "Requested On", ColumnKind::Date),
            Column::new("due_date", "Due Date", ColumnKind::Date),
            Column::new("notes", "Notes", ColumnKind::Text)
                .with_sortable(false)
                .hidden_by_default(),
        ],
        key_column: "lab_name".to_string(),
        status_column: Some("status".to_string()),
    }
}

fn delivery_registry() -> ColumnRegistry {
    ColumnRegistry {
        name: RecordType::Delivery.as_str().to_string(),
        columns: vec![
            Column::new("lab_name", "Lab Name", ColumnKind::Text).required(),
            Column::new("client", "Client", ColumnKind::Text),
            Column::new("lab_status", "Lab Status", enum_kind(DELIVERY_STATUSES)),
            Column::new("seats", "Seats", ColumnKind::Integer),
            Column::new("start_date", "Start Date", ColumnKind::Date),
            Column::new("end_date", "End Date", ColumnKind::Date),
            Column::new("delivery_value", "Delivery Value", ColumnKind::Currency),
            Column::new("trainer", "Trainer", ColumnKind::Text),
        ],
        key_column: "lab_name".to_string(),
        status_column: Some("lab_status".to_string()),
    }
}

fn master_data_registry() -> ColumnRegistry {
    ColumnRegistry {
        name: RecordType::MasterData.as_str().to_string(),
        columns: vec![
            Column::new("lab_code", "Lab Code", ColumnKind::Text).required(),
            Column::new("lab_name", "Lab Name", ColumnKind::Text),
            Column::new(
                "category",
                "Category",
                enum_kind(&["Cloud", "Security", "Data", "DevOps", "Networking"]),
            ),
            Column::new("technology", "Technology", ColumnKind::Text),
            Column::new("duration_days", "Duration (Days)", ColumnKind::Integer),
            Column::new("list_price", "List Price", ColumnKind::Currency),
            Column::new("discount", "Discount %", ColumnKind::Percentage),
            Column::new("last_updated", "Last Updated", ColumnKind::Date),
        ],
        key_column: "lab_code".to_string(),
        status_column: None,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registries_are_well_formed() {
        for rt in [RecordType::Solution, RecordType::Delivery, RecordType::MasterData] {
            let registry = rt.registry();
            registry.check().unwrap_or_else(|e| panic!("{rt}: {e}"));
            assert_eq!(get_columns(rt), registry.columns);
        }
    }

    #[test]
    fn test_column_order_and_lookup() {
        let registry = RecordType::Solution.registry();
        assert_eq!(registry.columns()[0].id, "lab_name");
        assert_eq!(registry.index_of("status"), Some(3));
        assert_eq!(registry.key_column().id, "lab_name");
        assert_eq!(registry.status_column().map(|c| c.id.as_str()), Some("status"));
        assert!(!registry.default_visible().contains("notes"));
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_resolve_header_is_lenient() {
        let registry = RecordType::Solution.registry();
        assert_eq!(registry.resolve_header("  QUOTE value ").map(|c| c.id.as_str()), Some("quote_value"));
        assert_eq!(registry.resolve_header("quote_value").map(|c| c.id.as_str()), Some("quote_value"));
        assert_eq!(registry.resolve_header("\u{feff}Lab Name").map(|c| c.id.as_str()), Some("lab_name"));
        assert!(registry.resolve_header("Favourite Colour").is_none());
    }

    #[test]
    fn test_validate_kinds() {
        let seats = Column::new("seats", "Seats", ColumnKind::Integer);
        assert_eq!(seats.validate(&Value::from("12")), Ok(Value::Number(12.0)));
        assert!(seats.validate(&Value::from("12.5")).is_err());
        assert!(seats.validate(&Value::from("twelve")).is_err());
        assert_eq!(seats.validate(&Value::from("")), Ok(Value::from("")));

        let price = Column::new("price", "Price", ColumnKind::Currency);
        assert_eq!(price.validate(&Value::from("$1,200.50")), Ok(Value::Number(1200.5)));

        let due = Column::new("due", "Due", ColumnKind::Date);
        assert_eq!(due.validate(&Value::from(" 2026-04-01 ")), Ok(Value::from("2026-04-01")));
        assert!(due.validate(&Value::from("April 1st")).is_err());

        let status = Column::new("status", "Status", enum_kind(SOLUTION_STATUSES));
        assert_eq!(status.validate(&Value::from("in progress")), Ok(Value::from("In Progress")));
        let err = status.validate(&Value::from("NotARealStatus")).unwrap_err();
        assert_eq!(err.column, "status");
    }

    #[test]
    fn test_required_rejects_blank() {
        let key = Column::new("lab_name", "Lab Name", ColumnKind::Text).required();
        assert!(key.validate(&Value::from("  ")).is_err());
        assert_eq!(key.validate(&Value::from(" AWS 101 ")), Ok(Value::from("AWS 101")));
    }

    #[test]
    fn test_render_by_kind() {
        let registry = RecordType::Solution.registry();
        let render = |id: &str, v: Value| registry.get(id).unwrap().render(Some(&v));
        assert_eq!(render("quote_value", Value::Number(1500.0)), "1500.00");
        assert_eq!(render("margin", Value::Number(12.5)), "12.5");
        assert_eq!(render("seats", Value::Number(20.0)), "20");
        assert_eq!(render("due_date", Value::from("2026-04-01T09:30:00Z")), "2026-04-01");
        assert_eq!(render("due_date", Value::from("soon")), "soon");
        assert_eq!(registry.get("client").unwrap().render(None), "");
    }

    #[test]
    fn test_validate_payload_fills_and_drops() {
        let registry = RecordType::Delivery.registry();
        let mut payload = Fields::new();
        payload.insert("lab_name".into(), Value::from("K8s Bootcamp"));
        payload.insert("lab_status".into(), Value::from("live"));
        payload.insert("colour".into(), Value::from("blue"));

        let out = registry.validate_payload(&payload).unwrap();
        assert_eq!(out.len(), registry.columns().len());
        assert_eq!(out["lab_status"], Value::from("Live"));
        assert_eq!(out["trainer"], Value::from(""));
        assert!(!out.contains_key("colour"));

        payload.remove("lab_name");
        let err = registry.validate_payload(&payload).unwrap_err();
        assert_eq!(err.column, "lab_name");
    }

    #[test]
    fn test_validate_patch_rejects_unknown_column() {
        let registry = RecordType::Delivery.registry();
        let mut patch = Fields::new();
        patch.insert("colour".into(), Value::from("blue"));
        assert_eq!(registry.validate_patch(&patch).unwrap_err().column, "colour");
    }
}
