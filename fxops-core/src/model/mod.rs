//! Model training: chronological split, OLS fit, held-out error.

pub mod linear;
pub mod metrics;
pub mod split;

pub use linear::{LinearModel, LinearRegression};
pub use split::{chronological_split, SplitIndex};

use crate::features::{lag_columns, TARGET_COLUMN};
use crate::frame::Frame;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("need at least {required} rows to train, got {actual}")]
    InsufficientRows { required: usize, actual: usize },

    #[error("test fraction must be in (0, 1), got {0}")]
    InvalidTestFraction(f64),

    #[error("expected column '{0}' is missing")]
    MissingColumn(String),

    #[error("no lag feature columns found")]
    NoFeatures,

    #[error("expected {expected} feature columns, got {actual}")]
    FeatureCountMismatch { expected: usize, actual: usize },

    #[error("column length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("features or target contain missing or infinite values")]
    NonFinite,
}

/// Training knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    pub test_fraction: f64,
    pub fit_intercept: bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            fit_intercept: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    /// RMSE on the held-out trailing block.
    pub rmse: f64,
    pub training_mse: f64,
    pub training_rmse: f64,
    pub training_mae: f64,
    pub training_r2: f64,
}

impl TrainingMetrics {
    /// Metric name/value pairs in logging order.
    pub fn as_pairs(&self) -> [(&'static str, f64); 5] {
        [
            ("rmse", self.rmse),
            ("training_mse", self.training_mse),
            ("training_rmse", self.training_rmse),
            ("training_mae", self.training_mae),
            ("training_r2", self.training_r2),
        ]
    }
}

/// Fitted model plus the numbers describing how it was fitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub model: LinearModel,
    pub metrics: TrainingMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
    pub test_fraction: f64,
}

/// Train on a feature table: every `lag_*` column predicts `y`.
pub fn train(features: &Frame, config: &TrainConfig) -> Result<TrainingOutcome, ModelError> {
    let target = features
        .column(TARGET_COLUMN)
        .ok_or_else(|| ModelError::MissingColumn(TARGET_COLUMN.to_string()))?;
    let names: Vec<String> = lag_columns(features)
        .into_iter()
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(ModelError::NoFeatures);
    }
    let columns: Vec<&[f64]> = names
        .iter()
        .filter_map(|n| features.column(n))
        .collect();

    let split = chronological_split(features.height(), config.test_fraction)?;
    let train_x: Vec<&[f64]> = columns.iter().map(|c| &c[split.train.clone()]).collect();
    let test_x: Vec<&[f64]> = columns.iter().map(|c| &c[split.test.clone()]).collect();
    let train_y = &target[split.train.clone()];
    let test_y = &target[split.test.clone()];

    let model = LinearRegression {
        fit_intercept: config.fit_intercept,
    }
    .fit(&names, &train_x, train_y)?;

    let train_pred = model.predict(&train_x)?;
    let test_pred = model.predict(&test_x)?;
    let metrics = TrainingMetrics {
        rmse: metrics::rmse(test_y, &test_pred),
        training_mse: metrics::mse(train_y, &train_pred),
        training_rmse: metrics::rmse(train_y, &train_pred),
        training_mae: metrics::mae(train_y, &train_pred),
        training_r2: metrics::r2(train_y, &train_pred),
    };

    info!(
        train_rows = split.train.len(),
        test_rows = split.test.len(),
        rmse = metrics.rmse,
        "model trained"
    );

    Ok(TrainingOutcome {
        model,
        metrics,
        train_rows: split.train.len(),
        test_rows: split.test.len(),
        test_fraction: config.test_fraction,
    })
}
