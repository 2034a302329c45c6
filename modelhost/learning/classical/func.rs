use ndarray::Array2;
use thiserror::Error;

use crate::{
    error::TrainingError,
    table::{Scalar, Table},
};

/// Predictor cell that cannot be used as a numeric feature.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("column '{column}' row {row}: expected a number, found '{value}'")]
pub struct FeatureError {
    /// Column name.
    pub column: String,
    /// Zero-based row index.
    pub row: usize,
    /// Offending cell as text (empty for missing cells).
    pub value: String,
}

/// Builds a row-major design matrix from the named columns, in the given order.
///
/// Callers check column presence beforehand; an absent column is treated as empty
/// and yields a zero-row matrix.
pub fn design_matrix(table: &Table, features: &[String]) -> Result<Array2<f64>, FeatureError> {
    let rows = table.row_count();
    let mut matrix = Array2::<f64>::zeros((rows, features.len()));
    for (col_idx, name) in features.iter().enumerate() {
        let Some(values) = table.column(name) else {
            return Ok(Array2::zeros((0, features.len())));
        };
        for (row_idx, cell) in values.iter().enumerate() {
            matrix[[row_idx, col_idx]] = cell.as_f64().ok_or_else(|| FeatureError {
                column: name.clone(),
                row: row_idx,
                value: cell.to_string(),
            })?;
        }
    }
    Ok(matrix)
}

/// Converts target cells into class labels (their text form).
pub fn label_strings(labels: &[Scalar]) -> Result<Vec<String>, TrainingError> {
    labels
        .iter()
        .enumerate()
        .map(|(row, cell)| {
            if cell.is_missing() {
                Err(TrainingError::MissingLabel(row))
            } else {
                Ok(cell.to_string())
            }
        })
        .collect()
}

/// Copies the selected rows of `matrix`.
#[must_use]
pub fn select_rows(matrix: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    matrix.select(ndarray::Axis(0), rows)
}

/// Copies the selected labels.
#[must_use]
pub fn select_labels(labels: &[String], rows: &[usize]) -> Vec<String> {
    rows.iter().map(|&idx| labels[idx].clone()).collect()
}
