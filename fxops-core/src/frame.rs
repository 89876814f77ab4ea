//! Time-indexed columnar table.
//!
//! A `Frame` is one row per period: a `timestamp` index plus named `f64`
//! columns kept in insertion order. Missing values are `NaN`. Every
//! transformation returns a new frame; a frame handed to the next step is
//! never mutated in place.

use chrono::NaiveDate;
use thiserror::Error;

/// Name of the index column in schemas and on-disk layouts.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("column '{column}' has {actual} values, frame has {expected} rows")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("column '{0}' already exists")]
    DuplicateColumn(String),

    #[error("column '{0}' not found")]
    MissingColumn(String),

    #[error("'timestamp' is reserved for the index")]
    ReservedName,
}

/// A single named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    timestamps: Vec<NaiveDate>,
    columns: Vec<Series>,
}

impl Frame {
    /// Create a frame with an index and no columns.
    pub fn new(timestamps: Vec<NaiveDate>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    /// Builder-style `push_column`.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, FrameError> {
        self.push_column(name, values)?;
        Ok(self)
    }

    /// Append a column. Its length must equal the frame height.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), FrameError> {
        let name = name.into();
        if name == TIMESTAMP_COLUMN {
            return Err(FrameError::ReservedName);
        }
        if self.column(&name).is_some() {
            return Err(FrameError::DuplicateColumn(name));
        }
        if values.len() != self.height() {
            return Err(FrameError::LengthMismatch {
                column: name,
                expected: self.height(),
                actual: values.len(),
            });
        }
        self.columns.push(Series { name, values });
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.timestamps.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDate] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[Series] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.values.as_slice())
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == TIMESTAMP_COLUMN || self.column(name).is_some()
    }

    /// Value column names in order (index excluded).
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|s| s.name.as_str()).collect()
    }

    /// Full ordered schema, index first.
    pub fn schema(&self) -> Vec<String> {
        std::iter::once(TIMESTAMP_COLUMN.to_string())
            .chain(self.columns.iter().map(|s| s.name.clone()))
            .collect()
    }

    /// Stable sort of all rows by ascending timestamp.
    pub fn sort_by_timestamp(&self) -> Frame {
        let mut order: Vec<usize> = (0..self.height()).collect();
        order.sort_by_key(|&i| self.timestamps[i]);
        self.take(&order)
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), FrameError> {
        if to == TIMESTAMP_COLUMN {
            return Err(FrameError::ReservedName);
        }
        if from != to && self.column(to).is_some() {
            return Err(FrameError::DuplicateColumn(to.to_string()));
        }
        let series = self
            .columns
            .iter_mut()
            .find(|s| s.name == from)
            .ok_or_else(|| FrameError::MissingColumn(from.to_string()))?;
        series.name = to.to_string();
        Ok(())
    }

    /// Values of `name` moved down by `periods` rows; the first `periods`
    /// entries are missing.
    pub fn shifted(&self, name: &str, periods: usize) -> Result<Vec<f64>, FrameError> {
        let values = self
            .column(name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))?;
        let n = values.len();
        let lead = periods.min(n);
        let mut out = vec![f64::NAN; lead];
        out.extend_from_slice(&values[..n - lead]);
        Ok(out)
    }

    /// Keep only rows with no missing value in any column.
    pub fn drop_incomplete(&self) -> Frame {
        let keep: Vec<usize> = (0..self.height())
            .filter(|&i| self.columns.iter().all(|s| !s.values[i].is_nan()))
            .collect();
        self.take(&keep)
    }

    /// Last `n` rows (all rows when `n >= height`).
    pub fn tail(&self, n: usize) -> Frame {
        let start = self.height().saturating_sub(n);
        self.slice(start, self.height() - start)
    }

    /// `len` rows starting at `offset`, clamped to the frame bounds.
    pub fn slice(&self, offset: usize, len: usize) -> Frame {
        let start = offset.min(self.height());
        let end = start.saturating_add(len).min(self.height());
        Frame {
            timestamps: self.timestamps[start..end].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|s| Series {
                    name: s.name.clone(),
                    values: s.values[start..end].to_vec(),
                })
                .collect(),
        }
    }

    /// BLAKE3 digest over the index and every column, in schema order.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for ts in &self.timestamps {
            hasher.update(ts.to_string().as_bytes());
        }
        for series in &self.columns {
            hasher.update(series.name.as_bytes());
            for v in &series.values {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }

    fn take(&self, rows: &[usize]) -> Frame {
        Frame {
            timestamps: rows.iter().map(|&i| self.timestamps[i]).collect(),
            columns: self
                .columns
                .iter()
                .map(|s| Series {
                    name: s.name.clone(),
                    values: rows.iter().map(|&i| s.values[i]).collect(),
                })
                .collect(),
        }
    }
}
