// CSV export, import template and import parse-back
//
// Export writes the caller's visible, ordered list with the registry's
// labels as headers. Import goes through the csv crate, so quoted cells
// with embedded delimiters, quotes and newlines come back unchanged.

use std::io::{Read, Write};
use std::path::Path;

use labgrid_engine::column::{Column, ColumnRegistry};
use labgrid_engine::error::ValidationError;
use labgrid_engine::record::Record;

use crate::error::{ExportError, ImportError};
use crate::import::{parse_import_rows, HeaderIndex, ImportOutcome, RawRow};

/// Header of the optional metadata column
pub const CREATED_AT_HEADER: &str = "Created At";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub delimiter: u8,
    /// Append a `Created At` column (RFC 3339)
    pub include_created_at: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            include_created_at: false,
        }
    }
}

// ============================================================================
// Export
// ============================================================================

/// Header cells for an export
pub fn header_row(columns: &[&Column], options: &ExportOptions) -> Vec<String> {
    let mut header: Vec<String> = columns.iter().map(|c| c.label.clone()).collect();
    if options.include_created_at {
        header.push(CREATED_AT_HEADER.to_string());
    }
    header
}

/// Rendered cells for one record
pub fn record_row(columns: &[&Column], record: &Record, options: &ExportOptions) -> Vec<String> {
    let mut row: Vec<String> = columns
        .iter()
        .map(|c| c.render(record.get(&c.id)))
        .collect();
    if options.include_created_at {
        row.push(record.created_at.to_rfc3339());
    }
    row
}

pub fn write_csv<'a, W, I>(
    writer: W,
    columns: &[&Column],
    records: I,
    options: &ExportOptions,
) -> Result<(), ExportError>
where
    W: Write,
    I: IntoIterator<Item = &'a Record>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(writer);

    writer.write_record(header_row(columns, options))?;
    for record in records {
        writer.write_record(record_row(columns, record, options))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_csv_string<'a, I>(
    columns: &[&Column],
    records: I,
    options: &ExportOptions,
) -> Result<String, ExportError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut buf = Vec::new();
    write_csv(&mut buf, columns, records, options)?;
    Ok(String::from_utf8(buf)?)
}

pub fn export_csv<'a, I>(
    path: &Path,
    columns: &[&Column],
    records: I,
    options: &ExportOptions,
) -> Result<(), ExportError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let file = std::fs::File::create(path)?;
    write_csv(file, columns, records, options)
}

/// Header row of every column's label plus one example row
pub fn import_template(registry: &ColumnRegistry) -> Result<String, ExportError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(registry.columns().iter().map(|c| c.label.as_str()))?;
    writer.write_record(registry.columns().iter().map(|c| c.kind.example_value()))?;
    let bytes = writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

// ============================================================================
// Import
// ============================================================================

/// Read an import file as text. Files that aren't UTF-8 are decoded as
/// Windows-1252, which is what Excel writes for "CSV" on most systems.
pub fn read_file_as_utf8(path: &Path) -> Result<String, ImportError> {
    let mut bytes = Vec::new();
    std::fs::File::open(path)?.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Records sampled when guessing the delimiter
const SNIFF_RECORDS: usize = 10;

/// Guess the field delimiter from the first few records.
///
/// Each candidate (comma, tab, semicolon, pipe) reads the sample as CSV, so
/// a quoted cell spanning several lines counts once. A candidate scores by
/// how many records split into the same field count as the header; wider
/// splits break ties. Falls back to comma.
pub fn sniff_delimiter(text: &str) -> u8 {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let candidates: &[u8] = &[b',', b'\t', b';', b'|'];

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = csv::ReaderBuilder::new()
            .delimiter(delim)
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .records()
            .map_while(Result::ok)
            .filter(|r| r.iter().any(|c| !c.trim().is_empty()))
            .take(SNIFF_RECORDS)
            .map(|r| r.len())
            .collect();

        let Some(&target) = counts.first() else {
            continue;
        };
        if target <= 1 {
            continue;
        }
        let score = counts.iter().filter(|&&c| c == target).count() * target;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Split CSV text into numbered raw rows
pub fn read_rows(text: &str, delimiter: u8) -> Result<Vec<RawRow>, ImportError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(rows.len() + 1);
        rows.push((line, record.iter().map(str::to_string).collect()));
    }
    Ok(rows)
}

/// Parse an uploaded CSV into rows via `parse_row`.
///
/// The first non-empty line is the header. See
/// [`parse_import_rows`] for the acceptance rules.
pub fn parse_import_file<T, F>(
    text: &str,
    delimiter: u8,
    required: &[&Column],
    parse_row: F,
) -> Result<ImportOutcome<T>, ImportError>
where
    F: FnMut(&HeaderIndex, &[String]) -> Result<T, ValidationError>,
{
    let rows = read_rows(text, delimiter)?;
    parse_import_rows(rows, required, parse_row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use labgrid_engine::column::RecordType;
    use labgrid_engine::record::Fields;
    use labgrid_engine::value::Value;
    use tempfile::tempdir;

    fn solution(id: &str, lab: &str, client: &str, quote: f64) -> Record {
        let mut fields = Fields::new();
        fields.insert("lab_name".into(), Value::from(lab));
        fields.insert("client".into(), Value::from(client));
        fields.insert("quote_value".into(), Value::Number(quote));
        fields.insert("due_date".into(), Value::from("2026-04-01T10:00:00Z"));
        Record::new(id, fields, Utc.with_ymd_and_hms(2026, 2, 3, 4, 5, 6).unwrap())
    }

    #[test]
    fn test_export_renders_by_kind() {
        let registry = RecordType::Solution.registry();
        let columns: Vec<&Column> = ["lab_name", "quote_value", "due_date"]
            .iter()
            .filter_map(|id| registry.get(id))
            .collect();
        let records = vec![solution("r1", "AWS 101", "Acme", 1500.0)];

        let out = export_csv_string(&columns, &records, &ExportOptions::default()).unwrap();
        assert_eq!(out, "Lab Name,Quote Value,Due Date\nAWS 101,1500.00,2026-04-01\n");
    }

    #[test]
    fn test_export_quotes_and_created_at() {
        let registry = RecordType::Solution.registry();
        let columns: Vec<&Column> = vec![registry.get("client").unwrap()];
        let records = vec![solution("r1", "AWS", "Acme, \"Inc.\"", 0.0)];
        let options = ExportOptions {
            delimiter: b',',
            include_created_at: true,
        };

        let out = export_csv_string(&columns, &records, &options).unwrap();
        assert_eq!(
            out,
            "Client,Created At\n\"Acme, \"\"Inc.\"\"\",2026-02-03T04:05:06+00:00\n"
        );
    }

    #[test]
    fn test_tab_delimiter() {
        let registry = RecordType::Solution.registry();
        let columns: Vec<&Column> = registry.columns().iter().take(2).collect();
        let records = vec![solution("r1", "AWS", "Acme, Inc.", 0.0)];
        let options = ExportOptions {
            delimiter: b'\t',
            ..ExportOptions::default()
        };
        let out = export_csv_string(&columns, &records, &options).unwrap();
        assert_eq!(out, "Lab Name\tClient\nAWS\tAcme, Inc.\n");
    }

    #[test]
    fn test_template_has_every_column() {
        let registry = RecordType::Delivery.registry();
        let template = import_template(&registry).unwrap();
        let rows = read_rows(&template, b',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].1.len(), registry.columns().len());
        assert_eq!(rows[0].1[0], "Lab Name");
        assert_eq!(rows[1].1[2], "Scheduled");

        // The example row itself is importable
        let outcome = parse_import_file(
            &template,
            b',',
            &crate::import::required_columns(&registry),
            crate::import::registry_row_parser(&registry),
        )
        .unwrap();
        assert_eq!(outcome.accepted, 1);
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter("Lab Name,Client\nA,B\n"), b',');
        assert_eq!(sniff_delimiter("Lab Name\tClient\nA, Inc.\tB\n"), b'\t');
        assert_eq!(sniff_delimiter("Lab Name;Client;Seats\nA;B;3\n"), b';');
        assert_eq!(sniff_delimiter("Lab Name\nA\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_sniff_delimiter_counts_multiline_cells_once() {
        // Each note spans three physical lines, two of which contain no
        // delimiter at all
        let text = "Lab Name;Notes\n\
                    A;\"first\nsecond\nthird\"\n\
                    B;\"one\ntwo\nthree\"\n\
                    C;plain\n";
        assert_eq!(sniff_delimiter(text), b';');
        let rows = read_rows(text, sniff_delimiter(text)).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1].1[1], "first\nsecond\nthird");
    }

    #[test]
    fn test_read_rows_line_numbers_and_bom() {
        let rows = read_rows("\u{feff}Lab Name,Notes\nA,\"two\nlines\"\nB,x\n", b',').unwrap();
        assert_eq!(rows[0].1[0], "Lab Name");
        assert_eq!(rows[1].0, 2);
        assert_eq!(rows[1].1[1], "two\nlines");
        assert_eq!(rows[2].0, 4);
    }

    #[test]
    fn test_read_file_falls_back_to_windows_1252() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Café" in Windows-1252
        std::fs::write(&path, b"Lab Name\nCaf\xe9\n").unwrap();

        let text = read_file_as_utf8(&path).unwrap();
        assert_eq!(text, "Lab Name\nCafé\n");
    }
}
