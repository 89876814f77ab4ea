//! fxops core: FX series acquisition, lag features, linear model, drift reports.
//!
//! This crate holds the domain types and pure computation of the workflow:
//! - `Frame`, a small time-indexed columnar table
//! - Data acquisition from Alpha Vantage behind an injectable HTTP client
//! - Lag feature preprocessing
//! - Ordinary least squares with a chronological train/test split
//! - Per-column drift detection rendered to HTML and JSON
//!
//! Orchestration (artifacts, run history, experiment tracking) lives in
//! `fxops-runner`.

pub mod data;
pub mod drift;
pub mod features;
pub mod frame;
pub mod model;

pub use data::{AlphaVantageProvider, CurrencyPair, DataError, DataProvider, HttpClient};
pub use drift::{DriftError, DriftOptions, DriftReport};
pub use features::{make_lag_features, FeatureError};
pub use frame::{Frame, FrameError};
pub use model::{LinearModel, ModelError, TrainConfig, TrainingOutcome};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn frame_is_send_sync() {
        assert_send::<Frame>();
        assert_sync::<Frame>();
    }

    #[test]
    fn model_types_are_send_sync() {
        assert_send::<LinearModel>();
        assert_sync::<LinearModel>();
        assert_send::<TrainingOutcome>();
        assert_sync::<TrainingOutcome>();
    }

    #[test]
    fn drift_report_is_send_sync() {
        assert_send::<DriftReport>();
        assert_sync::<DriftReport>();
        assert_send::<CurrencyPair>();
        assert_sync::<CurrencyPair>();
    }
}
