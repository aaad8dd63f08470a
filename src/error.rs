use std::io;

use thiserror::Error;

/// Message shown when an upload does not carry exactly the `n1` and `n2` columns.
pub const COLUMNS_MESSAGE: &str = "Excel file must contain exactly two columns: 'n1' and 'n2'";

/// Failure to turn raw bytes into a [`Table`](crate::dataset::Table).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no file was uploaded")]
    MissingFile,
    #[error("only one file can be uploaded at a time")]
    MultipleFiles,
    #[error("unsupported file type '{0}', expected an .xlsx workbook")]
    UnsupportedType(String),
    #[error("could not read workbook: {0}")]
    Workbook(#[from] calamine::XlsxError),
    #[error("workbook has no worksheets")]
    NoSheets,
}

/// An uploaded table that does not have the shape of a dataset.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{}", COLUMNS_MESSAGE)]
    Columns { found: Vec<String> },
    #[error("column '{column}' row {row} is not numeric: '{value}'")]
    NotNumeric {
        column: &'static str,
        row: usize,
        value: String,
    },
}

/// Failure while reading or rewriting the persisted stock.
#[derive(Debug, Error)]
pub enum StockError {
    #[error("stock file I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("stock file is unreadable: {0}")]
    Load(#[from] LoadError),
    #[error("stock file is corrupt: {0}")]
    Corrupt(#[from] ValidationError),
    #[error("could not encode stock workbook: {0}")]
    Encode(#[from] rust_xlsxwriter::XlsxError),
}

/// Failure to append an entry to the analytics log.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("could not write log entry: {0}")]
    Io(#[from] io::Error),
    #[error("could not serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Failure of the geo-IP lookup. Never reaches the user.
#[derive(Debug, Error)]
pub enum GeoIpError {
    #[error("geo-IP lookup is disabled")]
    Disabled,
    #[cfg(feature = "web")]
    #[error("geo-IP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("geo-IP response is not a JSON object")]
    NotAnObject,
}
