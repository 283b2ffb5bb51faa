use thiserror::Error;

/// A caller referenced a column that doesn't exist, or asked for an
/// operation the column doesn't support.
///
/// Controller setters return this and leave their state untouched. It
/// signals a caller bug, not a user-facing failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("unknown column '{0}'")]
    Unknown(String),
    #[error("column '{0}' is not filterable")]
    NotFilterable(String),
    #[error("column '{0}' is not sortable")]
    NotSortable(String),
    #[error("column '{column}' is {kind}; a {filter} filter does not apply")]
    FilterMismatch {
        column: String,
        kind: &'static str,
        filter: &'static str,
    },
}

impl ColumnError {
    /// The column id the caller referenced.
    pub fn column(&self) -> &str {
        match self {
            Self::Unknown(c) | Self::NotFilterable(c) | Self::NotSortable(c) => c,
            Self::FilterMismatch { column, .. } => column,
        }
    }
}

/// A value does not conform to its column's kind.
///
/// `row` is the 1-based data row of an import or bulk insert batch, when
/// the value came from one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}column '{column}': {message}", row_prefix(.row))]
pub struct ValidationError {
    pub row: Option<usize>,
    pub column: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            row: None,
            column: column.into(),
            message: message.into(),
        }
    }

    /// Attach the batch row this error came from.
    pub fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

fn row_prefix(row: &Option<usize>) -> String {
    row.map(|r| format!("row {r}, ")).unwrap_or_default()
}

/// A sheet schema failed to parse or validate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema parse error: {0}")]
    Parse(String),
    #[error("duplicate column id '{0}'")]
    DuplicateColumn(String),
    #[error("key column '{0}' is not declared")]
    UnknownKeyColumn(String),
    #[error("status column '{0}' is not declared")]
    UnknownStatusColumn(String),
    #[error("status column '{0}' must be an enum column")]
    StatusNotEnum(String),
    #[error("enum column '{0}' declares no values")]
    EmptyEnum(String),
    #[error("schema '{0}' declares no columns")]
    NoColumns(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_row_and_column() {
        let err = ValidationError::new("status", "'Nope' is not an allowed value").at_row(3);
        assert_eq!(
            err.to_string(),
            "row 3, column 'status': 'Nope' is not an allowed value"
        );

        let err = ValidationError::new("seats", "expected a whole number");
        assert_eq!(err.to_string(), "column 'seats': expected a whole number");
    }

    #[test]
    fn column_error_exposes_column() {
        let err = ColumnError::FilterMismatch {
            column: "due_date".into(),
            kind: "date",
            filter: "range",
        };
        assert_eq!(err.column(), "due_date");
        assert!(err.to_string().contains("date"));
    }
}
