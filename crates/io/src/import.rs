// Import reconciliation: header row -> column ids, data rows -> validated payloads
//
// Header cells are untrusted. They're matched against column labels and ids
// after trimming and lower-casing; unknown headers are ignored. A missing
// required header rejects the whole file before any row is looked at.

use std::collections::HashMap;

use labgrid_engine::column::{normalize_header, Column, ColumnRegistry};
use labgrid_engine::error::ValidationError;
use labgrid_engine::record::Fields;
use labgrid_engine::value::Value;

use crate::error::ImportError;

/// One raw row from a file: 1-based line (CSV) or row (workbook) number,
/// and its cells.
pub type RawRow = (usize, Vec<String>);

// ============================================================================
// Header index
// ============================================================================

/// Normalised header name -> cell index
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
    headers: Vec<String>,
}

impl HeaderIndex {
    pub fn new(headers: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            let key = normalize_header(h);
            if key.is_empty() {
                continue;
            }
            // First occurrence wins for duplicated headers
            positions.entry(key).or_insert(i);
        }
        Self {
            positions,
            headers: headers.to_vec(),
        }
    }

    /// Raw header cells as read
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Index of a header by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<usize> {
        self.positions.get(&normalize_header(name)).copied()
    }

    /// Index of a column's header, matched by label first, then id
    pub fn column(&self, column: &Column) -> Option<usize> {
        self.get(&column.label).or_else(|| self.get(&column.id))
    }

    /// Cell text under a header; short rows read as empty
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.get(name).map(|i| row.get(i).map(String::as_str).unwrap_or(""))
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// What an import produced. Only accepted rows are in `rows`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome<T> {
    pub rows: Vec<T>,
    pub accepted: usize,
    pub rejected: usize,
    /// 1-based line/row numbers of rejected rows
    pub rejected_lines: Vec<usize>,
}

impl<T> ImportOutcome<T> {
    /// "12 rows imported, 2 skipped"
    pub fn summary(&self) -> String {
        import_summary(self.accepted, self.rejected)
    }
}

/// "12 rows imported, 2 skipped" (the skipped part only when non-zero)
pub fn import_summary(imported: usize, skipped: usize) -> String {
    let mut msg = format!(
        "{} row{} imported",
        imported,
        if imported == 1 { "" } else { "s" }
    );
    if skipped > 0 {
        msg.push_str(&format!(", {} skipped", skipped));
    }
    msg
}

// ============================================================================
// Parse
// ============================================================================

/// Reconcile raw rows (first non-empty row = header) into parsed rows.
///
/// `parse_row` maps one data row to a payload; rows it rejects are counted
/// and dropped. Fully blank rows are skipped without being counted.
pub fn parse_import_rows<T, F>(
    rows: Vec<RawRow>,
    required: &[&Column],
    mut parse_row: F,
) -> Result<ImportOutcome<T>, ImportError>
where
    F: FnMut(&HeaderIndex, &[String]) -> Result<T, ValidationError>,
{
    let mut rows = rows.into_iter().filter(|(_, cells)| !is_blank_row(cells));

    let Some((_, header_cells)) = rows.next() else {
        return Err(ImportError::Empty);
    };
    let headers = HeaderIndex::new(&header_cells);

    let missing: Vec<String> = required
        .iter()
        .filter(|c| headers.column(c).is_none())
        .map(|c| c.label.clone())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingHeaders(missing));
    }

    let mut outcome = ImportOutcome {
        rows: Vec::new(),
        accepted: 0,
        rejected: 0,
        rejected_lines: Vec::new(),
    };
    let mut saw_data = false;

    for (line, cells) in rows {
        saw_data = true;
        match parse_row(&headers, &cells) {
            Ok(row) => {
                outcome.rows.push(row);
                outcome.accepted += 1;
            }
            Err(e) => {
                log::warn!("import: skipping line {}: {}", line, e.at_row(line));
                outcome.rejected += 1;
                outcome.rejected_lines.push(line);
            }
        }
    }

    if !saw_data {
        return Err(ImportError::NoDataRows);
    }
    if outcome.accepted == 0 {
        return Err(ImportError::NoValidRows {
            rejected: outcome.rejected,
        });
    }
    Ok(outcome)
}

fn is_blank_row(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Columns whose header must be present for an import to start
pub fn required_columns(registry: &ColumnRegistry) -> Vec<&Column> {
    let key = registry.key_column();
    registry
        .columns()
        .iter()
        .filter(|c| c.required || c.id == key.id)
        .collect()
}

/// Stock row parser for a registry.
///
/// Every recognised cell is validated against its column (enum values are
/// canonicalised). Rows with a blank key or any invalid cell are rejected.
/// Columns the file doesn't carry are left out of the payload.
pub fn registry_row_parser(
    registry: &ColumnRegistry,
) -> impl Fn(&HeaderIndex, &[String]) -> Result<Fields, ValidationError> + '_ {
    move |headers: &HeaderIndex, cells: &[String]| {
        let mut fields = Fields::new();
        for column in registry.columns() {
            let Some(index) = headers.column(column) else {
                continue;
            };
            let raw = cells.get(index).map(String::as_str).unwrap_or("");
            let value = column.validate(&Value::from(raw))?;
            fields.insert(column.id.clone(), value);
        }

        let key = registry.key_column();
        match fields.get(&key.id) {
            Some(v) if !v.is_blank() => Ok(fields),
            _ => Err(ValidationError::new(&key.id, "missing key value")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labgrid_engine::column::RecordType;

    fn raw(rows: &[&[&str]]) -> Vec<RawRow> {
        rows.iter()
            .enumerate()
            .map(|(i, cells)| (i + 1, cells.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_import_summary_wording() {
        assert_eq!(import_summary(1, 0), "1 row imported");
        assert_eq!(import_summary(12, 2), "12 rows imported, 2 skipped");
        assert_eq!(import_summary(0, 3), "0 rows imported, 3 skipped");
    }

    #[test]
    fn test_header_index_is_lenient() {
        let headers = HeaderIndex::new(&[
            "\u{feff}Lab Name".to_string(),
            "  STATUS ".to_string(),
            "".to_string(),
        ]);
        assert_eq!(headers.get("lab name"), Some(0));
        assert_eq!(headers.get("Status"), Some(1));
        assert_eq!(headers.get(""), None);

        let row = vec!["AWS".to_string()];
        assert_eq!(headers.cell(&row, "status"), Some(""));
        assert_eq!(headers.cell(&row, "seats"), None);
    }

    #[test]
    fn test_registry_parser_accepts_and_rejects() {
        let registry = RecordType::Solution.registry();
        let rows = raw(&[
            &["Lab Name", "Status", "Seats", "Colour"],
            &["AWS 101", "pending", "12", "red"],
            &["", "Quoted", "3", ""],
            &["GCP 201", "Bogus", "5", ""],
            &["", "", "", ""],
            &["Azure 301", "", "", ""],
        ]);

        let outcome = parse_import_rows(
            rows,
            &required_columns(&registry),
            registry_row_parser(&registry),
        )
        .unwrap();

        assert_eq!(outcome.accepted, 2);
        assert_eq!(outcome.rejected, 2);
        assert_eq!(outcome.rejected_lines, vec![3, 4]);
        assert_eq!(outcome.rows[0]["status"], Value::from("Pending"));
        assert_eq!(outcome.rows[0]["seats"], Value::Number(12.0));
        assert!(!outcome.rows[0].contains_key("colour"));
        assert_eq!(outcome.summary(), "2 rows imported, 2 skipped");
    }

    #[test]
    fn test_missing_required_header_rejects_file() {
        let registry = RecordType::Solution.registry();
        let rows = raw(&[&["Client", "Status"], &["Acme", "Pending"]]);
        let err = parse_import_rows(rows, &required_columns(&registry), registry_row_parser(&registry))
            .unwrap_err();
        match err {
            ImportError::MissingHeaders(missing) => assert_eq!(missing, vec!["Lab Name"]),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_header_only_and_empty() {
        let registry = RecordType::Solution.registry();
        let parser = registry_row_parser(&registry);
        let required = required_columns(&registry);

        let err = parse_import_rows(raw(&[&["Lab Name"], &["", ""]]), &required, &parser).unwrap_err();
        assert!(matches!(err, ImportError::NoDataRows));

        let err = parse_import_rows(raw(&[]), &required, &parser).unwrap_err();
        assert!(matches!(err, ImportError::Empty));
    }

    #[test]
    fn test_all_rows_rejected_is_an_error() {
        let registry = RecordType::Solution.registry();
        let rows = raw(&[&["Lab Name", "Seats"], &["Lab", "many"]]);
        let err = parse_import_rows(rows, &required_columns(&registry), registry_row_parser(&registry))
            .unwrap_err();
        assert!(matches!(err, ImportError::NoValidRows { rejected: 1 }));
    }

    #[test]
    fn test_id_headers_are_accepted() {
        let registry = RecordType::MasterData.registry();
        let rows = raw(&[&["lab_code", "list_price"], &["LC-1", "$1,999.00"]]);
        let outcome =
            parse_import_rows(rows, &required_columns(&registry), registry_row_parser(&registry)).unwrap();
        assert_eq!(outcome.rows[0]["list_price"], Value::Number(1999.0));
    }
}
