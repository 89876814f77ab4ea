//! Experiment tracking: params, metrics and models per training run.
//!
//! `FileTracker` layout:
//! `<root>/<experiment>/<run_id>/{meta.json, params.json, metrics.jsonl, model/model.json}`.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fxops_core::LinearModel;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("no tracking run is active")]
    NoActiveRun,

    #[error("tracking run {0} is still active")]
    RunActive(String),

    #[error("tracking IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("tracking JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingStatus {
    Running,
    Finished,
    Failed,
}

/// Records one training run's parameters, metrics and model.
pub trait ExperimentTracker {
    fn start_run(&mut self, run_id: &str) -> Result<(), TrackingError>;
    fn log_param(&mut self, key: &str, value: &str) -> Result<(), TrackingError>;
    fn log_metric(&mut self, key: &str, value: f64) -> Result<(), TrackingError>;
    fn log_model(&mut self, model: &LinearModel) -> Result<(), TrackingError>;
    fn end_run(&mut self, status: TrackingStatus) -> Result<(), TrackingError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    pub experiment: String,
    pub status: TrackingStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub key: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

struct ActiveRun {
    dir: PathBuf,
    meta: RunMeta,
    params: BTreeMap<String, String>,
}

/// File-backed tracker for one experiment.
pub struct FileTracker {
    root: PathBuf,
    experiment: String,
    active: Option<ActiveRun>,
}

impl FileTracker {
    pub fn new(root: impl Into<PathBuf>, experiment: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            experiment: experiment.into(),
            active: None,
        }
    }

    /// Directory of a run of this experiment.
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(&self.experiment).join(run_id)
    }

    fn active(&mut self) -> Result<&mut ActiveRun, TrackingError> {
        self.active.as_mut().ok_or(TrackingError::NoActiveRun)
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> TrackingError + '_ {
    move |source| TrackingError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), TrackingError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(io_err(path))
}

impl ExperimentTracker for FileTracker {
    fn start_run(&mut self, run_id: &str) -> Result<(), TrackingError> {
        if let Some(active) = &self.active {
            return Err(TrackingError::RunActive(active.meta.run_id.clone()));
        }
        let dir = self.run_dir(run_id);
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let meta = RunMeta {
            run_id: run_id.to_string(),
            experiment: self.experiment.clone(),
            status: TrackingStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
        };
        write_json(&dir.join("meta.json"), &meta)?;
        debug!(experiment = %self.experiment, run_id, "tracking run started");

        self.active = Some(ActiveRun {
            dir,
            meta,
            params: BTreeMap::new(),
        });
        Ok(())
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), TrackingError> {
        let active = self.active()?;
        active.params.insert(key.to_string(), value.to_string());
        write_json(&active.dir.join("params.json"), &active.params)
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<(), TrackingError> {
        let active = self.active()?;
        let path = active.dir.join("metrics.jsonl");
        let line = serde_json::to_string(&MetricEntry {
            key: key.to_string(),
            value,
            timestamp: Utc::now(),
        })?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err(&path))?;
        writeln!(file, "{line}").map_err(io_err(&path))
    }

    fn log_model(&mut self, model: &LinearModel) -> Result<(), TrackingError> {
        let active = self.active()?;
        let dir = active.dir.join("model");
        fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        write_json(&dir.join("model.json"), model)
    }

    fn end_run(&mut self, status: TrackingStatus) -> Result<(), TrackingError> {
        let mut active = self.active.take().ok_or(TrackingError::NoActiveRun)?;
        active.meta.status = status;
        active.meta.finished_at = Some(Utc::now());
        write_json(&active.dir.join("meta.json"), &active.meta)?;
        debug!(run_id = %active.meta.run_id, ?status, "tracking run ended");
        Ok(())
    }
}

/// Tracker that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryTracker {
    pub runs: Vec<(String, TrackingStatus)>,
    pub params: BTreeMap<String, String>,
    pub metrics: Vec<(String, f64)>,
    pub models: Vec<LinearModel>,
    active: Option<String>,
}

impl MemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| *v)
    }
}

impl ExperimentTracker for MemoryTracker {
    fn start_run(&mut self, run_id: &str) -> Result<(), TrackingError> {
        if let Some(active) = &self.active {
            return Err(TrackingError::RunActive(active.clone()));
        }
        self.active = Some(run_id.to_string());
        self.runs.push((run_id.to_string(), TrackingStatus::Running));
        Ok(())
    }

    fn log_param(&mut self, key: &str, value: &str) -> Result<(), TrackingError> {
        self.active.as_ref().ok_or(TrackingError::NoActiveRun)?;
        self.params.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<(), TrackingError> {
        self.active.as_ref().ok_or(TrackingError::NoActiveRun)?;
        self.metrics.push((key.to_string(), value));
        Ok(())
    }

    fn log_model(&mut self, model: &LinearModel) -> Result<(), TrackingError> {
        self.active.as_ref().ok_or(TrackingError::NoActiveRun)?;
        self.models.push(model.clone());
        Ok(())
    }

    fn end_run(&mut self, status: TrackingStatus) -> Result<(), TrackingError> {
        let run_id = self.active.take().ok_or(TrackingError::NoActiveRun)?;
        if let Some(entry) = self.runs.iter_mut().rev().find(|(id, _)| *id == run_id) {
            entry.1 = status;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> LinearModel {
        LinearModel {
            feature_names: vec!["lag_1".into()],
            coefficients: vec![1.0],
            intercept: 0.5,
            fit_intercept: true,
            rank: 1,
        }
    }

    #[test]
    fn file_tracker_writes_run_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = FileTracker::new(dir.path(), "fx_training_pipeline");
        tracker.start_run("run-1").unwrap();
        tracker.log_param("fit_intercept", "true").unwrap();
        tracker.log_param("lags", "5").unwrap();
        tracker.log_metric("rmse", 0.25).unwrap();
        tracker.log_metric("training_r2", 0.9).unwrap();
        tracker.log_model(&model()).unwrap();
        tracker.end_run(TrackingStatus::Finished).unwrap();

        let run_dir = tracker.run_dir("run-1");
        let meta: RunMeta =
            serde_json::from_str(&fs::read_to_string(run_dir.join("meta.json")).unwrap()).unwrap();
        assert_eq!(meta.status, TrackingStatus::Finished);
        assert!(meta.finished_at.is_some());

        let params: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(run_dir.join("params.json")).unwrap())
                .unwrap();
        assert_eq!(params.get("lags").map(String::as_str), Some("5"));

        let metrics = fs::read_to_string(run_dir.join("metrics.jsonl")).unwrap();
        assert_eq!(metrics.lines().count(), 2);

        let saved: LinearModel = serde_json::from_str(
            &fs::read_to_string(run_dir.join("model").join("model.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved, model());
    }

    #[test]
    fn logging_without_a_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = FileTracker::new(dir.path(), "e");
        assert!(matches!(
            tracker.log_metric("rmse", 1.0),
            Err(TrackingError::NoActiveRun)
        ));
        assert!(matches!(
            tracker.end_run(TrackingStatus::Finished),
            Err(TrackingError::NoActiveRun)
        ));
    }

    #[test]
    fn nested_runs_are_rejected() {
        let mut tracker = MemoryTracker::new();
        tracker.start_run("a").unwrap();
        assert!(matches!(
            tracker.start_run("b"),
            Err(TrackingError::RunActive(id)) if id == "a"
        ));
    }

    #[test]
    fn memory_tracker_records_status() {
        let mut tracker = MemoryTracker::new();
        tracker.start_run("a").unwrap();
        tracker.log_metric("rmse", 2.0).unwrap();
        tracker.log_metric("rmse", 1.0).unwrap();
        tracker.end_run(TrackingStatus::Failed).unwrap();
        assert_eq!(tracker.runs, vec![("a".to_string(), TrackingStatus::Failed)]);
        assert_eq!(tracker.metric("rmse"), Some(1.0));
    }
}
