//! `fx_monitoring_pipeline`: reference data → current data → drift report.
//!
//! Reference data is the feature table of the last successful training
//! run, read back through the run registry. Current data is its trailing
//! window.

use tracing::info;

use fxops_core::drift::DriftOptions;
use fxops_core::{DriftError, DriftReport, Frame};

use crate::artifacts::{load_artifact, DriftReportMaterializer, MaterializerRegistry};
use crate::config::Settings;
use crate::pipeline::{run_pipeline, PipelineEnv, PipelineError, PipelineOutcome, StepError};
use crate::registry::RunRegistry;
use crate::training::{PREPROCESS_STEP, PROCESSED_OUTPUT, TRAINING_PIPELINE};

pub const MONITORING_PIPELINE: &str = "fx_monitoring_pipeline";

pub const REFERENCE_STEP: &str = "get_reference_data";
pub const REFERENCE_OUTPUT: &str = "reference_data";
pub const CURRENT_STEP: &str = "get_current_data";
pub const CURRENT_OUTPUT: &str = "current_data";
pub const DRIFT_STEP: &str = "generate_drift_report";
pub const DRIFT_OUTPUT: &str = "drift_report";

#[derive(Debug, Clone, PartialEq)]
pub struct MonitoringOptions {
    pub current_window: usize,
    pub drift: DriftOptions,
}

impl Default for MonitoringOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl MonitoringOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            current_window: settings.monitoring.current_window,
            drift: settings.monitoring.drift_options(),
        }
    }
}

/// Load `processed_data` from the last successful training run.
pub fn get_reference_data(
    registry: &dyn RunRegistry,
    materializers: &MaterializerRegistry,
) -> Result<Frame, StepError> {
    let run = registry.last_successful_run(TRAINING_PIPELINE)?;
    let artifact = run.output(PREPROCESS_STEP, PROCESSED_OUTPUT)?;
    let frame = load_artifact::<Frame>(materializers, artifact)?.ok_or_else(|| {
        StepError::ArtifactUnavailable {
            run_id: run.run_id.clone(),
            step: PREPROCESS_STEP.to_string(),
            output: PROCESSED_OUTPUT.to_string(),
        }
    })?;
    info!(run_id = %run.run_id, rows = frame.height(), "loaded reference data");
    Ok(frame)
}

/// The trailing `window` rows of the reference data.
pub fn get_current_data(reference: &Frame, window: usize) -> Frame {
    reference.tail(window)
}

pub fn generate_drift_report(
    reference: &Frame,
    current: &Frame,
    options: &DriftOptions,
) -> Result<DriftReport, DriftError> {
    DriftReport::generate(reference, current, options)
}

/// Run the full monitoring pipeline once.
pub fn fx_monitoring_pipeline(
    env: PipelineEnv<'_>,
    options: &MonitoringOptions,
) -> Result<PipelineOutcome<DriftReport>, PipelineError> {
    run_pipeline(MONITORING_PIPELINE, env, |run| {
        let reference = run.step(REFERENCE_STEP, REFERENCE_OUTPUT, || {
            get_reference_data(env.registry, env.materializers)
        })?;
        let current = run.step(CURRENT_STEP, CURRENT_OUTPUT, || {
            Ok::<_, StepError>(get_current_data(&reference, options.current_window))
        })?;
        run.step_with_materializer(DRIFT_STEP, DRIFT_OUTPUT, &DriftReportMaterializer, || {
            generate_drift_report(&reference, &current, &options.drift)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{ArtifactStore, FrameMaterializer, Materializer};
    use crate::registry::{
        new_run_id, ArtifactRecord, MemoryRunRegistry, RegistryError, RunRecord, RunStatus,
        StepRecord,
    };
    use chrono::{NaiveDate, Utc};
    use std::path::Path;

    fn features(n: usize) -> Frame {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let dates = (0..n)
            .map(|i| start + chrono::Duration::days(i as i64))
            .collect();
        Frame::new(dates)
            .with_column("y", (0..n).map(|i| 80.0 + i as f64 * 0.01).collect())
            .unwrap()
            .with_column("lag_1", (0..n).map(|i| 80.0 + i as f64 * 0.01 - 0.01).collect())
            .unwrap()
    }

    /// Record a completed training run whose feature table lives under `root`.
    fn seed_training_run(registry: &MemoryRunRegistry, root: &Path, frame: &Frame) -> String {
        let run_id = new_run_id(TRAINING_PIPELINE);
        let uri = root.join(&run_id);
        std::fs::create_dir_all(&uri).unwrap();
        FrameMaterializer.save(frame, &uri).unwrap();

        let mut run = RunRecord::new(run_id.clone(), TRAINING_PIPELINE);
        run.status = RunStatus::Completed;
        run.steps.push(StepRecord {
            name: PREPROCESS_STEP.into(),
            status: RunStatus::Completed,
            started_at: Utc::now(),
            finished_at: Some(Utc::now()),
            outputs: vec![ArtifactRecord {
                name: PROCESSED_OUTPUT.into(),
                uri,
                type_name: std::any::type_name::<Frame>().into(),
                materializer: "frame".into(),
            }],
            visualizations: Default::default(),
        });
        registry.record(&run).unwrap();
        run_id
    }

    #[test]
    fn reference_data_comes_from_last_training_run() {
        let dir = tempfile::tempdir().unwrap();
        let registry = MemoryRunRegistry::new();
        let frame = features(50);
        seed_training_run(&registry, dir.path(), &frame);

        let loaded =
            get_reference_data(&registry, &MaterializerRegistry::with_defaults()).unwrap();
        assert_eq!(loaded, frame);
    }

    #[test]
    fn reference_data_without_training_run_fails() {
        let registry = MemoryRunRegistry::new();
        assert!(matches!(
            get_reference_data(&registry, &MaterializerRegistry::with_defaults()),
            Err(StepError::Registry(RegistryError::NoSuccessfulRun { .. }))
        ));
    }

    #[test]
    fn current_data_is_a_suffix_of_reference() {
        let reference = features(250);
        let current = get_current_data(&reference, 100);
        assert_eq!(current.height(), 100);
        assert_eq!(current.timestamps(), &reference.timestamps()[150..]);

        let short = features(40);
        assert_eq!(get_current_data(&short, 100), short);
    }

    #[test]
    fn monitoring_run_writes_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("artifacts"));
        let materializers = MaterializerRegistry::with_defaults();
        let registry = MemoryRunRegistry::new();
        seed_training_run(&registry, &dir.path().join("seed"), &features(300));

        let env = PipelineEnv {
            store: &store,
            materializers: &materializers,
            registry: &registry,
        };
        let outcome = fx_monitoring_pipeline(env, &MonitoringOptions::default()).unwrap();

        assert_eq!(outcome.value.current_rows, 100);
        assert_eq!(outcome.value.reference_rows, 300);
        let report = outcome.record.output(DRIFT_STEP, DRIFT_OUTPUT).unwrap();
        assert!(report.uri.join("report.html").is_file());
        assert!(report.uri.join("report.json").is_file());
        assert_eq!(report.materializer, "drift_report");
        assert_eq!(outcome.record.step(DRIFT_STEP).unwrap().visualizations.len(), 1);
    }

    #[test]
    fn monitoring_without_training_is_recorded_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let materializers = MaterializerRegistry::with_defaults();
        let registry = MemoryRunRegistry::new();
        let env = PipelineEnv {
            store: &store,
            materializers: &materializers,
            registry: &registry,
        };

        let err = fx_monitoring_pipeline(env, &MonitoringOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Step { ref step, .. } if step == REFERENCE_STEP));
        let run = registry.runs(MONITORING_PIPELINE).unwrap().pop().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().contains(TRAINING_PIPELINE));
    }
}
