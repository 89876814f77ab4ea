//! Drift report generation and persistence.

use super::ks::ks_two_sample;
use super::render;
use super::DriftError;
use crate::frame::Frame;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::info;

pub const STATTEST_NAME: &str = "K-S p_value";

/// Thresholds for the per-column test and the dataset verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftOptions {
    /// A column drifts when its p-value is below this.
    pub stattest_threshold: f64,
    /// The dataset drifts when at least this share of columns drift.
    pub drift_share: f64,
}

impl Default for DriftOptions {
    fn default() -> Self {
        Self {
            stattest_threshold: 0.05,
            drift_share: 0.5,
        }
    }
}

/// Descriptive statistics of one column on one side of the comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
}

impl ColumnSummary {
    fn of(values: &[f64]) -> Self {
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = if n > 1 {
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        Self {
            count: n,
            mean,
            std: var.sqrt(),
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDrift {
    pub column: String,
    pub stattest: String,
    pub statistic: f64,
    pub p_value: f64,
    pub threshold: f64,
    pub drift_detected: bool,
    pub reference: ColumnSummary,
    pub current: ColumnSummary,
}

/// Statistical comparison of a current table against a reference table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated_at: DateTime<Utc>,
    pub reference_rows: usize,
    pub current_rows: usize,
    pub options: DriftOptions,
    pub columns: Vec<ColumnDrift>,
    pub number_of_columns: usize,
    pub number_of_drifted_columns: usize,
    pub share_of_drifted_columns: f64,
    pub dataset_drift: bool,
}

impl DriftReport {
    /// Compare every value column of `current` against `reference`.
    ///
    /// The two frames must carry the same set of columns. Missing values are
    /// ignored per column; a column with no values on either side is an
    /// error.
    pub fn generate(
        reference: &Frame,
        current: &Frame,
        options: &DriftOptions,
    ) -> Result<Self, DriftError> {
        if reference.is_empty() || current.is_empty() {
            return Err(DriftError::EmptyInput {
                reference_rows: reference.height(),
                current_rows: current.height(),
            });
        }
        let ref_cols: BTreeSet<&str> = reference.column_names().into_iter().collect();
        let cur_cols: BTreeSet<&str> = current.column_names().into_iter().collect();
        if ref_cols != cur_cols {
            return Err(DriftError::SchemaMismatch {
                only_reference: ref_cols.difference(&cur_cols).map(|s| s.to_string()).collect(),
                only_current: cur_cols.difference(&ref_cols).map(|s| s.to_string()).collect(),
            });
        }

        let mut columns = Vec::with_capacity(ref_cols.len());
        for series in reference.columns() {
            let name = series.name.as_str();
            let ref_values = present(&series.values);
            let cur_values = present(current.column(name).unwrap_or_default());
            let ks = ks_two_sample(&ref_values, &cur_values)
                .ok_or_else(|| DriftError::EmptyColumn(name.to_string()))?;

            columns.push(ColumnDrift {
                column: name.to_string(),
                stattest: STATTEST_NAME.to_string(),
                statistic: ks.statistic,
                p_value: ks.p_value,
                threshold: options.stattest_threshold,
                drift_detected: ks.p_value < options.stattest_threshold,
                reference: ColumnSummary::of(&ref_values),
                current: ColumnSummary::of(&cur_values),
            });
        }

        let number_of_columns = columns.len();
        let number_of_drifted_columns = columns.iter().filter(|c| c.drift_detected).count();
        let share_of_drifted_columns = if number_of_columns == 0 {
            0.0
        } else {
            number_of_drifted_columns as f64 / number_of_columns as f64
        };
        let dataset_drift = number_of_columns > 0 && share_of_drifted_columns >= options.drift_share;

        info!(
            columns = number_of_columns,
            drifted = number_of_drifted_columns,
            dataset_drift,
            "drift report generated"
        );

        Ok(Self {
            generated_at: Utc::now(),
            reference_rows: reference.height(),
            current_rows: current.height(),
            options: options.clone(),
            columns,
            number_of_columns,
            number_of_drifted_columns,
            share_of_drifted_columns,
            dataset_drift,
        })
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDrift> {
        self.columns.iter().find(|c| c.column == name)
    }

    pub fn to_json(&self) -> Result<String, DriftError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DriftError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Self-contained HTML page (inline styles, no external assets).
    pub fn to_html(&self) -> String {
        render::html(self)
    }

    pub fn save_json(&self, path: &Path) -> Result<(), DriftError> {
        let json = self.to_json()?;
        fs::write(path, json).map_err(|source| DriftError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_html(&self, path: &Path) -> Result<(), DriftError> {
        fs::write(path, self.to_html()).map_err(|source| DriftError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn present(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}
