// Excel export (xlsx) and workbook import (xlsx, xls, xlsb, ods)
//
// Export: one worksheet, bold header row, numeric kinds written as numbers
//         so totals work in the spreadsheet app, everything else as text.
// Import: cells are flattened to text and fed through the same header
//         reconciliation as CSV. Date serials become yyyy-mm-dd.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use labgrid_engine::column::Column;
use labgrid_engine::error::ValidationError;
use labgrid_engine::record::Record;
use labgrid_engine::value::format_number;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};

use crate::csv::{header_row, record_row, ExportOptions};
use crate::error::{ExportError, ImportError};
use crate::import::{parse_import_rows, HeaderIndex, ImportOutcome, RawRow};

/// Excel caps sheet names at 31 characters
const MAX_SHEET_NAME: usize = 31;

// ============================================================================
// Export
// ============================================================================

fn build_workbook<'a, I>(
    sheet_name: &str,
    columns: &[&Column],
    records: I,
    options: &ExportOptions,
) -> Result<Workbook, ExportError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_title(sheet_name))?;

    let bold = Format::new().set_bold();
    for (col, label) in header_row(columns, options).iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, label, &bold)?;
    }

    let mut widths: Vec<usize> = header_row(columns, options)
        .iter()
        .map(|h| h.chars().count())
        .collect();

    for (i, record) in records.into_iter().enumerate() {
        let row = (i + 1) as u32;
        let cells = record_row(columns, record, options);
        for (col, text) in cells.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            let numeric = columns.get(col).is_some_and(|c| c.kind.is_numeric());
            write_cell(worksheet, row, col as u16, text, numeric)?;
            if let Some(w) = widths.get_mut(col) {
                *w = (*w).max(text.chars().count());
            }
        }
    }

    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, (*width).clamp(8, 60) as f64 + 2.0)?;
    }
    worksheet.set_freeze_panes(1, 0)?;

    Ok(workbook)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    text: &str,
    numeric: bool,
) -> Result<(), XlsxError> {
    match text.parse::<f64>() {
        Ok(n) if numeric && n.is_finite() => worksheet.write_number(row, col, n)?,
        _ => worksheet.write_string(row, col, text)?,
    };
    Ok(())
}

/// Worksheet names can't contain `[]:*?/\` and are at most 31 chars
fn sheet_title(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .take(MAX_SHEET_NAME)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

/// Write the records to an .xlsx file
pub fn export_xlsx<'a, I>(
    path: &Path,
    sheet_name: &str,
    columns: &[&Column],
    records: I,
    options: &ExportOptions,
) -> Result<(), ExportError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut workbook = build_workbook(sheet_name, columns, records, options)?;
    workbook.save(path)?;
    Ok(())
}

/// Same as [`export_xlsx`], into memory (for downloads)
pub fn export_xlsx_buffer<'a, I>(
    sheet_name: &str,
    columns: &[&Column],
    records: I,
    options: &ExportOptions,
) -> Result<Vec<u8>, ExportError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut workbook = build_workbook(sheet_name, columns, records, options)?;
    Ok(workbook.save_to_buffer()?)
}

// ============================================================================
// Import
// ============================================================================

/// Excel's 1900 date system epoch (serial 0), accounting for the 1900
/// leap-year bug
fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Last serial Excel can represent (9999-12-31)
const MAX_SERIAL: f64 = 2_958_465.0;

/// Excel serial -> `yyyy-mm-dd`, or `yyyy-mm-ddThh:mm:ss` when there's a
/// time part. Serials outside Excel's range give `None`.
pub fn serial_to_iso(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 || serial >= MAX_SERIAL + 1.0 {
        return None;
    }
    let days = serial.floor();
    let mut date = excel_epoch()?.checked_add_signed(Duration::try_days(days as i64)?)?;

    let mut secs = ((serial - days) * 86_400.0).round() as i64;
    // x.99999... rounds up to the next midnight
    if secs >= 86_400 {
        date = date.succ_opt()?;
        secs = 0;
    }
    if secs == 0 {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    let dt = date.and_hms_opt(0, 0, 0)? + Duration::try_seconds(secs)?;
    Some(dt.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => format_number(*n),
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            serial_to_iso(serial).unwrap_or_else(|| format_number(serial))
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

/// Read one worksheet as numbered text rows.
///
/// `sheet = None` reads the first sheet.
pub fn read_workbook_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<RawRow>, ImportError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path)?;
    let names: Vec<String> = workbook.sheet_names().to_vec();

    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| ImportError::NoSuchSheet(wanted.to_string()))?,
        None => names.first().cloned().ok_or(ImportError::NoSheets)?,
    };

    let range = workbook.worksheet_range(&name)?;
    // Row numbers as the user sees them in the spreadsheet app
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);

    Ok(range
        .rows()
        .enumerate()
        .map(|(i, row)| (first_row + i + 1, row.iter().map(cell_text).collect()))
        .collect())
}

/// Parse an uploaded workbook into rows via `parse_row`
pub fn parse_import_workbook<T, F>(
    path: &Path,
    sheet: Option<&str>,
    required: &[&Column],
    parse_row: F,
) -> Result<ImportOutcome<T>, ImportError>
where
    F: FnMut(&HeaderIndex, &[String]) -> Result<T, ValidationError>,
{
    let rows = read_workbook_rows(path, sheet)?;
    parse_import_rows(rows, required, parse_row)
}
