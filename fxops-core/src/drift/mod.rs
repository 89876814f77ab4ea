//! Data drift between a reference table and a current table.

pub mod ks;
mod render;
pub mod report;

pub use ks::{ks_two_sample, KsResult};
pub use report::{ColumnDrift, ColumnSummary, DriftOptions, DriftReport};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriftError {
    #[error(
        "reference and current schemas differ (only in reference: {only_reference:?}, only in current: {only_current:?})"
    )]
    SchemaMismatch {
        only_reference: Vec<String>,
        only_current: Vec<String>,
    },

    #[error("cannot compare empty data (reference: {reference_rows} rows, current: {current_rows} rows)")]
    EmptyInput {
        reference_rows: usize,
        current_rows: usize,
    },

    #[error("column '{0}' has no values to compare")]
    EmptyColumn(String),

    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}
