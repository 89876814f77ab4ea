//! fxops runner: pipeline orchestration for training and drift monitoring.
//!
//! This crate builds on `fxops-core` to provide:
//! - TOML settings with per-section defaults
//! - An artifact store with per-type materializers (Parquet frames, JSON
//!   models, HTML/JSON drift reports)
//! - A JSONL run registry recording every run, step and output
//! - File-backed experiment tracking
//! - The `fx_training_pipeline` and `fx_monitoring_pipeline` runs

pub mod artifacts;
pub mod config;
pub mod monitoring;
pub mod pipeline;
pub mod registry;
pub mod tracking;
pub mod training;

pub use artifacts::{
    load_artifact, ArtifactError, ArtifactStore, DriftReportMaterializer, FrameMaterializer,
    JsonMaterializer, Materializer, MaterializerRegistry, VisualizationType, Visualizations,
};
pub use config::{ConfigError, Settings};
pub use monitoring::{fx_monitoring_pipeline, MonitoringOptions, MONITORING_PIPELINE};
pub use pipeline::{
    error_chain, run_pipeline, PipelineEnv, PipelineError, PipelineOutcome, PipelineRun, StepError,
};
pub use registry::{
    ArtifactRecord, FileRunRegistry, MemoryRunRegistry, RegistryError, RunId, RunRecord,
    RunRegistry, RunStatus, StepRecord,
};
pub use tracking::{ExperimentTracker, FileTracker, MemoryTracker, TrackingError, TrackingStatus};
pub use training::{fx_training_pipeline, TrainingOptions, TRAINING_PIPELINE};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn records_are_send_sync() {
        assert_send::<RunRecord>();
        assert_sync::<RunRecord>();
        assert_send::<ArtifactRecord>();
        assert_sync::<ArtifactRecord>();
    }

    #[test]
    fn materializers_are_send_sync() {
        assert_send::<MaterializerRegistry>();
        assert_sync::<MaterializerRegistry>();
        assert_send::<DriftReportMaterializer>();
        assert_sync::<DriftReportMaterializer>();
    }

    #[test]
    fn settings_are_send_sync() {
        assert_send::<Settings>();
        assert_sync::<Settings>();
        assert_send::<ArtifactStore>();
        assert_sync::<ArtifactStore>();
    }
}
