use calamine::Data;
use serde::Serialize;

use crate::error::ValidationError;

/// Name of the first dataset column
pub const N1: &str = "n1";
/// Name of the second dataset column
pub const N2: &str = "n2";

/// Raw contents of a worksheet
///
/// The first row of the sheet becomes `headers`; every row below it is kept
/// as-is in `rows`, one cell per header.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Data>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Data>>) -> Self {
        Table { headers, rows }
    }
}

/// One `n1`/`n2` pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Row {
    pub n1: f64,
    pub n2: f64,
}

impl Row {
    pub fn new(n1: f64, n2: f64) -> Self {
        Row { n1, n2 }
    }
}

/// A validated two-column numeric table
///
/// Every dataset in the application (uploads after transformation, the stock)
/// has exactly the columns `n1` and `n2`, so rows are stored as pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Dataset { rows }
    }

    /// Build a dataset from two equally long columns.
    pub fn from_columns(n1: &[f64], n2: &[f64]) -> Self {
        let rows = n1.iter().zip(n2).map(|(&a, &b)| Row::new(a, b)).collect();
        Dataset { rows }
    }

    /// Validate a raw table and read its cells as numbers
    ///
    /// The header set must be exactly `{n1, n2}` in either order. Any other
    /// header, a missing one, or a duplicate rejects the whole table. Cells
    /// must be integers or floats; anything else (text, booleans, blanks,
    /// error cells) is rejected with the offending column and 1-based row.
    /// Rows with no value at all are skipped.
    ///
    /// # Arguments
    /// * `table` - The raw sheet contents
    ///
    /// # Returns
    /// * `Result<Dataset, ValidationError>` - The dataset with `n1`/`n2` in canonical order
    pub fn from_table(table: &Table) -> Result<Self, ValidationError> {
        let (n1_idx, n2_idx) = column_positions(&table.headers)?;

        let mut rows = Vec::with_capacity(table.rows.len());
        for (r, cells) in table.rows.iter().enumerate() {
            if cells.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }
            let n1 = numeric_cell(cells.get(n1_idx), N1, r + 1)?;
            let n2 = numeric_cell(cells.get(n2_idx), N2, r + 1)?;
            rows.push(Row::new(n1, n2));
        }

        Ok(Dataset { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append the rows of `other` after the rows of `self`.
    pub fn extend(&mut self, other: &Dataset) {
        self.rows.extend_from_slice(&other.rows);
    }

    pub fn n1(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.n1).collect()
    }

    pub fn n2(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.n2).collect()
    }
}

fn column_positions(headers: &[String]) -> Result<(usize, usize), ValidationError> {
    let reject = || ValidationError::Columns {
        found: headers.to_vec(),
    };

    if headers.len() != 2 {
        return Err(reject());
    }
    match (headers[0].as_str(), headers[1].as_str()) {
        (N1, N2) => Ok((0, 1)),
        (N2, N1) => Ok((1, 0)),
        _ => Err(reject()),
    }
}

fn numeric_cell(
    cell: Option<&Data>,
    column: &'static str,
    row: usize,
) -> Result<f64, ValidationError> {
    match cell {
        Some(Data::Int(i)) => Ok(*i as f64),
        Some(Data::Float(f)) => Ok(*f),
        other => Err(ValidationError::NotNumeric {
            column,
            row,
            value: other.map(|c| c.to_string()).unwrap_or_default(),
        }),
    }
}
