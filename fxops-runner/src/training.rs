//! `fx_training_pipeline`: fetch → preprocess → train.

use tracing::{info, warn};

use fxops_core::features::make_lag_features;
use fxops_core::model::{train, TrainConfig};
use fxops_core::{CurrencyPair, DataError, DataProvider, FeatureError, Frame, TrainingOutcome};

use crate::config::Settings;
use crate::pipeline::{run_pipeline, PipelineEnv, PipelineError, PipelineOutcome, StepError};
use crate::tracking::{ExperimentTracker, TrackingStatus};

pub const TRAINING_PIPELINE: &str = "fx_training_pipeline";

pub const FETCH_STEP: &str = "fetch_data";
pub const RAW_OUTPUT: &str = "raw_data";
pub const PREPROCESS_STEP: &str = "preprocess_data";
pub const PROCESSED_OUTPUT: &str = "processed_data";
pub const TRAIN_STEP: &str = "train_model";
pub const MODEL_OUTPUT: &str = "trained_model";

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    pub pair: CurrencyPair,
    pub lags: usize,
    pub train: TrainConfig,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl TrainingOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pair: settings.data.pair(),
            lags: settings.features.lags,
            train: settings.training.train_config(),
        }
    }
}

/// Fetch the raw daily series for `pair`.
pub fn fetch_data(provider: &dyn DataProvider, pair: &CurrencyPair) -> Result<Frame, DataError> {
    let raw = provider.fetch(pair)?;
    info!(
        provider = provider.name(),
        pair = %pair,
        rows = raw.height(),
        "fetched raw series"
    );
    Ok(raw)
}

/// Build the lag feature table.
pub fn preprocess_data(raw: &Frame, lags: usize) -> Result<Frame, FeatureError> {
    make_lag_features(raw, lags)
}

/// Fit the model and log the run to `tracker`.
///
/// If fitting fails the tracking run is ended as failed. On success it is
/// left open; the caller ends it once the outcome has been stored.
pub fn train_model(
    features: &Frame,
    options: &TrainingOptions,
    tracker: &mut dyn ExperimentTracker,
    run_id: &str,
) -> Result<TrainingOutcome, StepError> {
    tracker.start_run(run_id)?;
    match fit_and_log(features, options, tracker) {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            end_failed(tracker);
            Err(e)
        }
    }
}

/// End the active tracking run as failed, logging rather than returning
/// any error.
fn end_failed(tracker: &mut dyn ExperimentTracker) {
    if let Err(e) = tracker.end_run(TrackingStatus::Failed) {
        warn!(error = %e, "could not end tracking run as failed");
    }
}

fn fit_and_log(
    features: &Frame,
    options: &TrainingOptions,
    tracker: &mut dyn ExperimentTracker,
) -> Result<TrainingOutcome, StepError> {
    let n_features = fxops_core::features::lag_columns(features).len();
    tracker.log_param("fit_intercept", &options.train.fit_intercept.to_string())?;
    tracker.log_param("n_features", &n_features.to_string())?;
    tracker.log_param("test_fraction", &options.train.test_fraction.to_string())?;
    tracker.log_param("lags", &options.lags.to_string())?;

    let outcome = train(features, &options.train)?;
    for (key, value) in outcome.metrics.as_pairs() {
        tracker.log_metric(key, value)?;
    }
    tracker.log_model(&outcome.model)?;
    Ok(outcome)
}

/// Run the full training pipeline once.
pub fn fx_training_pipeline(
    env: PipelineEnv<'_>,
    provider: &dyn DataProvider,
    tracker: &mut dyn ExperimentTracker,
    options: &TrainingOptions,
) -> Result<PipelineOutcome<TrainingOutcome>, PipelineError> {
    run_pipeline(TRAINING_PIPELINE, env, |run| {
        let raw = run.step(FETCH_STEP, RAW_OUTPUT, || fetch_data(provider, &options.pair))?;
        let features = run.step(PREPROCESS_STEP, PROCESSED_OUTPUT, || {
            preprocess_data(&raw, options.lags)
        })?;
        let run_id = run.run_id().to_string();
        let mut tracking_open = false;
        let trained = run.step(TRAIN_STEP, MODEL_OUTPUT, || {
            let outcome = train_model(&features, options, &mut *tracker, &run_id)?;
            tracking_open = true;
            Ok::<_, StepError>(outcome)
        });
        match trained {
            Ok(outcome) => {
                tracker.end_run(TrackingStatus::Finished)?;
                Ok(outcome)
            }
            Err(e) => {
                // Fitted, but the model could not be stored.
                if tracking_open {
                    end_failed(tracker);
                }
                Err(e)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{
        ArtifactError, ArtifactStore, FrameMaterializer, MaterializerRegistry, MODEL_FILE,
    };
    use crate::registry::{MemoryRunRegistry, RunRegistry, RunStatus};
    use crate::tracking::{MemoryTracker, TrackingError};
    use fxops_core::LinearModel;
    use chrono::NaiveDate;
    use std::cell::Cell;

    /// Serves a fixed linear close series and counts fetches.
    struct LinearProvider {
        rows: usize,
        calls: Cell<usize>,
    }

    impl DataProvider for LinearProvider {
        fn name(&self) -> &str {
            "linear"
        }

        fn fetch(&self, _pair: &CurrencyPair) -> Result<Frame, DataError> {
            self.calls.set(self.calls.get() + 1);
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let dates = (0..self.rows)
                .map(|i| start + chrono::Duration::days(i as i64))
                .collect();
            Ok(Frame::new(dates).with_column(
                "close",
                (0..self.rows).map(|i| 100.0 + i as f64).collect(),
            )?)
        }
    }

    struct NoKey;

    impl DataProvider for NoKey {
        fn name(&self) -> &str {
            "nokey"
        }

        fn fetch(&self, _pair: &CurrencyPair) -> Result<Frame, DataError> {
            Err(DataError::MissingApiKey {
                env: "ALPHA_VANTAGE_API_KEY",
            })
        }
    }

    #[test]
    fn pipeline_records_three_steps_and_tracks_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let materializers = MaterializerRegistry::with_defaults();
        let registry = MemoryRunRegistry::new();
        let env = PipelineEnv {
            store: &store,
            materializers: &materializers,
            registry: &registry,
        };
        let provider = LinearProvider {
            rows: 10,
            calls: Cell::new(0),
        };
        let mut tracker = MemoryTracker::new();

        let outcome =
            fx_training_pipeline(env, &provider, &mut tracker, &TrainingOptions::default())
                .unwrap();

        assert_eq!(provider.calls.get(), 1);
        assert!(outcome.value.metrics.rmse < 0.01);
        assert_eq!(outcome.record.status, RunStatus::Completed);
        let steps: Vec<&str> = outcome.record.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(steps, vec![FETCH_STEP, PREPROCESS_STEP, TRAIN_STEP]);

        let model = outcome.record.output(TRAIN_STEP, MODEL_OUTPUT).unwrap();
        assert!(model.uri.join(MODEL_FILE).is_file());

        assert_eq!(tracker.runs, vec![(outcome.record.run_id.clone(), TrackingStatus::Finished)]);
        assert_eq!(tracker.params.get("lags").map(String::as_str), Some("5"));
        assert_eq!(tracker.params.get("n_features").map(String::as_str), Some("5"));
        assert_eq!(tracker.metric("rmse"), Some(outcome.value.metrics.rmse));
        assert_eq!(tracker.models.len(), 1);
    }

    #[test]
    fn missing_key_fails_the_run_before_preprocessing() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let materializers = MaterializerRegistry::with_defaults();
        let registry = MemoryRunRegistry::new();
        let env = PipelineEnv {
            store: &store,
            materializers: &materializers,
            registry: &registry,
        };
        let mut tracker = MemoryTracker::new();

        let err = fx_training_pipeline(env, &NoKey, &mut tracker, &TrainingOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Step {
                source: StepError::Data(DataError::MissingApiKey { .. }),
                ..
            }
        ));

        let run = registry.runs(TRAINING_PIPELINE).unwrap().pop().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.steps.len(), 1);
        assert!(run.steps[0].outputs.is_empty());
        assert!(tracker.runs.is_empty());
    }

    #[test]
    fn too_short_series_ends_tracking_run_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let materializers = MaterializerRegistry::with_defaults();
        let registry = MemoryRunRegistry::new();
        let env = PipelineEnv {
            store: &store,
            materializers: &materializers,
            registry: &registry,
        };
        let provider = LinearProvider {
            rows: 6,
            calls: Cell::new(0),
        };
        let mut tracker = MemoryTracker::new();

        let err = fx_training_pipeline(env, &provider, &mut tracker, &TrainingOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Step {
                source: StepError::Model(_),
                ..
            }
        ));
        assert_eq!(tracker.runs[0].1, TrackingStatus::Failed);
    }

    #[test]
    fn unstored_model_ends_tracking_run_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut materializers = MaterializerRegistry::new();
        materializers.register::<Frame>(FrameMaterializer);
        let registry = MemoryRunRegistry::new();
        let env = PipelineEnv {
            store: &store,
            materializers: &materializers,
            registry: &registry,
        };
        let provider = LinearProvider {
            rows: 10,
            calls: Cell::new(0),
        };
        let mut tracker = MemoryTracker::new();

        let err = fx_training_pipeline(env, &provider, &mut tracker, &TrainingOptions::default())
            .unwrap_err();
        match err {
            PipelineError::Step { step, source } => {
                assert_eq!(step, TRAIN_STEP);
                assert!(matches!(
                    source,
                    StepError::Artifact(ArtifactError::NoMaterializer { .. })
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(tracker.runs.len(), 1);
        assert_eq!(tracker.runs[0].1, TrackingStatus::Failed);

        let run = registry.runs(TRAINING_PIPELINE).unwrap().pop().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.steps.len(), 3);
        assert!(run.steps[2].outputs.is_empty());
    }

    /// Records everything but refuses to end a run.
    struct StuckTracker(MemoryTracker);

    impl ExperimentTracker for StuckTracker {
        fn start_run(&mut self, run_id: &str) -> Result<(), TrackingError> {
            self.0.start_run(run_id)
        }

        fn log_param(&mut self, key: &str, value: &str) -> Result<(), TrackingError> {
            self.0.log_param(key, value)
        }

        fn log_metric(&mut self, key: &str, value: f64) -> Result<(), TrackingError> {
            self.0.log_metric(key, value)
        }

        fn log_model(&mut self, model: &LinearModel) -> Result<(), TrackingError> {
            self.0.log_model(model)
        }

        fn end_run(&mut self, _status: TrackingStatus) -> Result<(), TrackingError> {
            Err(TrackingError::NoActiveRun)
        }
    }

    #[test]
    fn fit_error_wins_over_end_run_error() {
        let provider = LinearProvider {
            rows: 6,
            calls: Cell::new(0),
        };
        let raw = provider.fetch(&CurrencyPair::default()).unwrap();
        let options = TrainingOptions::default();
        let features = preprocess_data(&raw, options.lags).unwrap();
        let mut tracker = StuckTracker(MemoryTracker::new());

        let err = train_model(&features, &options, &mut tracker, "run-1").unwrap_err();
        assert!(matches!(err, StepError::Model(_)), "got {err}");
        assert_eq!(tracker.0.runs, vec![("run-1".to_string(), TrackingStatus::Running)]);
    }
}
