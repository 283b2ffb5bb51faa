use thiserror::Error;

/// An import file was rejected as a whole. Nothing from it may be inserted.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("the file is empty")]
    Empty,
    #[error("the file has a header row but no data rows")]
    NoDataRows,
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingHeaders(Vec<String>),
    #[error("no valid rows ({rejected} rejected)")]
    NoValidRows { rejected: usize },
    #[error("workbook has no sheet named '{0}'")]
    NoSuchSheet(String),
    #[error("workbook has no sheets")]
    NoSheets,
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not read workbook: {0}")]
    Workbook(#[from] calamine::Error),
}

/// Writing an export or template failed.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("could not write file: {0}")]
    Io(#[from] std::io::Error),
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
    #[error("export is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
