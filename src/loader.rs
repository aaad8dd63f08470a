use calamine::{Data, Reader, Xlsx};
use std::io::Cursor;
use std::path::Path;

use crate::dataset::Table;
use crate::error::LoadError;

/// Load the first worksheet of an Excel workbook held in memory
///
/// The first row of the sheet is taken as the header row and every following
/// row as data. An empty worksheet yields a table with no headers, which
/// validation later rejects.
///
/// # Arguments
/// * `bytes` - Raw XLSX file content
///
/// # Returns
/// * `Result<Table, LoadError>` - The sheet contents or an error
pub fn from_xlsx_bytes(bytes: &[u8]) -> Result<Table, LoadError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;

    // Get the first worksheet
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(LoadError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(header_name).collect(),
        None => return Ok(Table::default()),
    };
    let rows = rows.map(|row| row.to_vec()).collect();

    Ok(Table::new(headers, rows))
}

/// Check that an uploaded file name carries the `.xlsx` extension.
pub fn ensure_xlsx(file_name: &str) -> Result<(), LoadError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("xlsx") => Ok(()),
        Some(ext) => Err(LoadError::UnsupportedType(ext.to_string())),
        None => Err(LoadError::UnsupportedType(file_name.to_string())),
    }
}

fn header_name(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}
