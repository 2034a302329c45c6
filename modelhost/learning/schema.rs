use std::collections::HashSet;

use thiserror::Error;

use crate::table::{Scalar, Table};

/// Requested predictor/target columns do not fit the fetched table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Columns absent from the table, in request order.
    #[error("missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    /// Predictor list is empty.
    #[error("no predictor columns requested")]
    NoPredictors,
    /// A column is requested twice (as predictor and/or target).
    #[error("column '{0}' requested more than once")]
    DuplicateColumn(String),
}

/// Narrowed view over the requested predictor and target columns.
#[derive(Debug, Clone)]
pub struct ValidatedTable {
    predictors: Vec<String>,
    target: String,
    view: Table,
}

impl ValidatedTable {
    /// Predictor names in feature-vector order.
    #[must_use]
    pub fn predictors(&self) -> &[String] {
        &self.predictors
    }

    /// Target column name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Label vector, row-aligned with the predictors.
    #[must_use]
    pub fn labels(&self) -> &[Scalar] {
        self.view.column(&self.target).unwrap_or_default()
    }

    /// Table holding exactly the predictor columns followed by the target.
    #[must_use]
    pub const fn view(&self) -> &Table {
        &self.view
    }

    /// Number of rows.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.view.row_count()
    }
}

/// Checks that every predictor and the target exist in `table` and returns the narrowed view.
pub fn validate(
    table: &Table,
    predictors: &[String],
    target: &str,
) -> Result<ValidatedTable, SchemaError> {
    if predictors.is_empty() {
        return Err(SchemaError::NoPredictors);
    }
    let missing: Vec<String> = predictors
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(target))
        .filter(|name| !table.contains(name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::MissingColumns(missing));
    }
    let mut seen = HashSet::with_capacity(predictors.len() + 1);
    for name in predictors.iter().map(String::as_str).chain(std::iter::once(target)) {
        if !seen.insert(name) {
            return Err(SchemaError::DuplicateColumn(name.to_string()));
        }
    }

    let view = Table::from_columns(
        predictors
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(target))
            .map(|name| {
                let values = table.column(name).map(<[Scalar]>::to_vec).unwrap_or_default();
                (name.to_string(), values)
            }),
    )
    // Columns come from a consistent table and names were de-duplicated above.
    .map_err(|_| SchemaError::DuplicateColumn(target.to_string()))?;

    Ok(ValidatedTable {
        predictors: predictors.to_vec(),
        target: target.to_string(),
        view,
    })
}
