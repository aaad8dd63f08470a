use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};

use crate::dataset::{Dataset, N1, N2};

/// MIME type of every workbook served for download
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// File name offered for the result of an upload
pub const PROCESSED_FILE_NAME: &str = "processed_result.xlsx";
/// File name offered for the accumulated stock
pub const STOCK_FILE_NAME: &str = "stock_data.xlsx";

/// Convert a dataset to XLSX format
///
/// Writes a header row `n1`, `n2` followed by one row per dataset row, the
/// same layout the loader expects to read back.
///
/// # Arguments
/// * `dataset` - Reference to the dataset to convert
///
/// # Returns
/// * `Result<Vec<u8>, XlsxError>` - XLSX file content as bytes or an error
///
/// # Examples
/// ```
/// use xlstock::dataset::Dataset;
/// use xlstock::downloader::to_xlsx;
///
/// let dataset = Dataset::from_columns(&[5.0], &[3.0]);
/// match to_xlsx(&dataset) {
///     Ok(xlsx_data) => println!("XLSX generated: {} bytes", xlsx_data.len()),
///     Err(e) => eprintln!("Failed to generate XLSX: {}", e),
/// }
/// ```
pub fn to_xlsx(dataset: &Dataset) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    worksheet.write_string(0, 0, N1)?;
    worksheet.write_string(0, 1, N2)?;

    for (r, row) in dataset.rows.iter().enumerate() {
        let r = (r + 1) as u32;
        worksheet.write_number(r, 0, row.n1)?;
        worksheet.write_number(r, 1, row.n2)?;
    }

    workbook.push_worksheet(worksheet);

    workbook.save_to_buffer()
}

/// A workbook ready to be sent to the browser
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// The transformed rows of a single upload.
    pub fn processed(dataset: &Dataset) -> Result<Self, XlsxError> {
        Ok(Attachment {
            file_name: PROCESSED_FILE_NAME,
            bytes: to_xlsx(dataset)?,
        })
    }

    /// The full accumulated stock.
    pub fn stock(dataset: &Dataset) -> Result<Self, XlsxError> {
        Ok(Attachment {
            file_name: STOCK_FILE_NAME,
            bytes: to_xlsx(dataset)?,
        })
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.file_name)
    }
}
