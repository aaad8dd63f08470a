use log::debug;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

use crate::dataset::Dataset;
use crate::downloader::to_xlsx;
use crate::error::StockError;
use crate::loader::from_xlsx_bytes;

/// The persisted stock workbook
///
/// All rows ever uploaded (after transformation) live in a single XLSX file.
/// Every append reads the file, adds the new rows at the end and rewrites it.
/// The read-modify-write runs under a mutex so two requests in the same
/// process cannot lose each other's rows.
#[derive(Debug)]
pub struct StockStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StockStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StockStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current stock
    ///
    /// # Returns
    /// * `Ok(None)` - No stock has been written yet
    /// * `Ok(Some(dataset))` - The stored rows in file order
    /// * `Err(StockError)` - The file exists but could not be read or parsed
    pub fn read(&self) -> Result<Option<Dataset>, StockError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_unlocked()
    }

    /// Append rows to the stock and persist the result
    ///
    /// When no stock exists the given rows become the stock. Otherwise they are
    /// placed after the existing rows, without deduplication or sorting.
    ///
    /// # Arguments
    /// * `rows` - Transformed rows of one upload
    ///
    /// # Returns
    /// * `Result<Dataset, StockError>` - The full stock as written
    pub fn append(&self, rows: &Dataset) -> Result<Dataset, StockError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let stock = match self.read_unlocked()? {
            Some(mut existing) => {
                existing.extend(rows);
                existing
            }
            None => rows.clone(),
        };
        self.write_unlocked(&stock)?;

        debug!(
            "stock {} now holds {} rows (+{})",
            self.path.display(),
            stock.len(),
            rows.len()
        );
        Ok(stock)
    }

    fn read_unlocked(&self) -> Result<Option<Dataset>, StockError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let table = from_xlsx_bytes(&bytes)?;
        Ok(Some(Dataset::from_table(&table)?))
    }

    // Write to a sibling temp file first so a failed write leaves the old stock intact.
    fn write_unlocked(&self, stock: &Dataset) -> Result<(), StockError> {
        let bytes = to_xlsx(stock)?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(&bytes)?;
        file.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }
}
