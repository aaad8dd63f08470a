use crate::dataset::{Dataset, Row, Table};
use crate::error::ValidationError;

/// Divisor applied to every `n1` value
pub const N1_DIVISOR: f64 = 2.0;
/// Divisor applied to every `n2` value
pub const N2_DIVISOR: f64 = 3.0;

/// Validate an uploaded table and scale its columns
///
/// Halves every `n1` and divides every `n2` by three. Row count and order are
/// preserved. A table whose columns are not exactly `n1` and `n2`, or that has a
/// non-numeric cell, is rejected as a whole.
///
/// # Arguments
/// * `table` - The first worksheet of the upload
///
/// # Returns
/// * `Result<Dataset, ValidationError>` - The transformed rows or the reason for rejection
///
/// # Examples
/// ```
/// use calamine::Data;
/// use xlstock::dataset::{Row, Table};
/// use xlstock::transform::transform;
///
/// let table = Table::new(
///     vec!["n1".to_string(), "n2".to_string()],
///     vec![vec![Data::Int(10), Data::Int(9)]],
/// );
/// let processed = transform(&table).unwrap();
/// assert_eq!(processed.rows, vec![Row::new(5.0, 3.0)]);
/// ```
pub fn transform(table: &Table) -> Result<Dataset, ValidationError> {
    let dataset = Dataset::from_table(table)?;

    let rows = dataset
        .rows
        .iter()
        .map(|row| Row::new(row.n1 / N1_DIVISOR, row.n2 / N2_DIVISOR))
        .collect();

    Ok(Dataset::new(rows))
}
