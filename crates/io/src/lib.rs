// File I/O: CSV/XLSX export, import template, CSV/workbook import

pub mod csv;
pub mod error;
pub mod import;
pub mod xlsx;

pub use crate::csv::ExportOptions;
pub use error::{ExportError, ImportError};
pub use import::{registry_row_parser, required_columns, HeaderIndex, ImportOutcome};
