use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

/// Single cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Numeric cell.
    Number(f64),
    /// Categorical or free-form cell.
    Text(String),
    /// Empty cell.
    Missing,
}

impl Scalar {
    /// Parses a raw CSV cell. Surrounding whitespace is dropped; empty cells
    /// and `NaN` become [`Scalar::Missing`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_nan() => Self::Missing,
            Ok(value) => Self::Number(value),
            Err(_) => Self::Text(trimmed.to_string()),
        }
    }

    /// Returns the numeric value when the cell holds one.
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns true for empty cells.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
            Self::Missing => Ok(()),
        }
    }
}

/// Errors raised while building, parsing or writing tables.
#[derive(Debug, Error)]
pub enum TableError {
    /// Payload is not well-formed CSV (ragged rows, bad encoding, ...).
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
    /// Payload has no header row.
    #[error("table has no header row")]
    MissingHeader,
    /// Two columns share a name.
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    /// A column does not match the table's row count.
    #[error("column '{column}' has {found} values, table has {expected} rows")]
    LengthMismatch {
        /// Offending column.
        column: String,
        /// Row count of the table.
        expected: usize,
        /// Length of the offending column.
        found: usize,
    },
    /// Serialized output could not be flushed.
    #[error("writing csv: {0}")]
    Write(String),
}

/// Ordered collection of equally sized, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexMap<String, Vec<Scalar>>,
    rows: usize,
}

impl Table {
    /// Builds a table from `(name, values)` pairs, preserving their order.
    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Vec<Scalar>)>,
    ) -> Result<Self, TableError> {
        let mut table = Self::default();
        for (name, values) in columns {
            table.push_column(name, values)?;
        }
        Ok(table)
    }

    /// Parses a comma-delimited payload with a header row.
    pub fn from_csv(bytes: &[u8]) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(bytes);
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(TableError::MissingHeader);
        }
        let mut columns: IndexMap<String, Vec<Scalar>> = IndexMap::with_capacity(headers.len());
        for name in &headers {
            if columns.insert(name.to_string(), Vec::new()).is_some() {
                return Err(TableError::DuplicateColumn(name.to_string()));
            }
        }
        let mut rows = 0;
        for record in reader.records() {
            let record = record?;
            for (values, cell) in columns.values_mut().zip(record.iter()) {
                values.push(Scalar::parse(cell));
            }
            rows += 1;
        }
        Ok(Self { columns, rows })
    }

    /// Serializes the table back to CSV, header first, rows in order.
    pub fn to_csv(&self) -> Result<Vec<u8>, TableError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.columns.keys())?;
        for row in 0..self.rows {
            writer.write_record(self.columns.values().map(|values| values[row].to_string()))?;
        }
        writer
            .into_inner()
            .map_err(|err| TableError::Write(err.to_string()))
    }

    /// Appends a column at the end of the table.
    pub fn push_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Scalar>,
    ) -> Result<(), TableError> {
        let name = name.into();
        if self.columns.contains_key(&name) {
            return Err(TableError::DuplicateColumn(name));
        }
        if self.columns.is_empty() {
            self.rows = values.len();
        } else if values.len() != self.rows {
            return Err(TableError::LengthMismatch {
                column: name,
                expected: self.rows,
                found: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.keys().map(String::as_str)
    }

    /// Values of the named column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Scalar]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Whether the named column exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Number of rows.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Cells of row `index` in column order.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<Vec<&Scalar>> {
        (index < self.rows).then(|| self.columns.values().map(|values| &values[index]).collect())
    }
}
