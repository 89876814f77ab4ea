//! Run registry: which pipeline runs happened and what they produced.
//!
//! `FileRunRegistry` persists one JSON object per line to `runs.jsonl`.
//! A run is appended when it starts and again when it ends; the latest
//! line for a run id is its current state. Malformed lines are skipped.

use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::artifacts::Visualizations;

pub const RUNS_FILE: &str = "runs.jsonl";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("run registry IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("run registry JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no successful run of pipeline '{pipeline}'")]
    NoSuccessfulRun { pipeline: String },

    #[error("run {run_id} has no step '{step}'")]
    MissingStep { run_id: String, step: String },

    #[error("step '{step}' of run {run_id} has no output '{output}'")]
    MissingOutput {
        run_id: String,
        step: String,
        output: String,
    },
}

/// Identifier of one pipeline run: start time plus a short hash suffix.
pub type RunId = String;

/// Fresh run id, e.g. `20241014T093015.123-1a2b3c4d`.
pub fn new_run_id(pipeline: &str) -> RunId {
    let now = Utc::now();
    let mut hasher = blake3::Hasher::new();
    hasher.update(pipeline.as_bytes());
    hasher.update(&now.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    let digest = hasher.finalize().to_hex().to_string();
    format!("{}-{}", now.format("%Y%m%dT%H%M%S%.3f"), &digest[..8])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// One persisted step output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub name: String,
    pub uri: PathBuf,
    /// `std::any::type_name` of the stored value.
    pub type_name: String,
    pub materializer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub outputs: Vec<ArtifactRecord>,
    #[serde(default)]
    pub visualizations: Visualizations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: RunId,
    pub pipeline: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
}

impl RunRecord {
    pub fn new(run_id: RunId, pipeline: impl Into<String>) -> Self {
        Self {
            run_id,
            pipeline: pipeline.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            steps: Vec::new(),
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// The recorded output `output` of step `step`.
    pub fn output(&self, step: &str, output: &str) -> Result<&ArtifactRecord, RegistryError> {
        let record = self.step(step).ok_or_else(|| RegistryError::MissingStep {
            run_id: self.run_id.clone(),
            step: step.to_string(),
        })?;
        record
            .outputs
            .iter()
            .find(|o| o.name == output)
            .ok_or_else(|| RegistryError::MissingOutput {
                run_id: self.run_id.clone(),
                step: step.to_string(),
                output: output.to_string(),
            })
    }
}

/// Handle to the store of run records.
pub trait RunRegistry {
    /// Persist the current state of a run.
    fn record(&self, run: &RunRecord) -> Result<(), RegistryError>;

    /// Latest state of every run of `pipeline`, oldest first.
    fn runs(&self, pipeline: &str) -> Result<Vec<RunRecord>, RegistryError>;

    /// The most recently started completed run of `pipeline`.
    fn last_successful_run(&self, pipeline: &str) -> Result<RunRecord, RegistryError> {
        self.runs(pipeline)?
            .into_iter()
            .filter(|r| r.status == RunStatus::Completed)
            .max_by_key(|r| r.started_at)
            .ok_or_else(|| RegistryError::NoSuccessfulRun {
                pipeline: pipeline.to_string(),
            })
    }
}

/// Keep the last record per run id, in first-seen order.
fn latest_per_run(records: impl IntoIterator<Item = RunRecord>, pipeline: &str) -> Vec<RunRecord> {
    let mut latest: Vec<RunRecord> = Vec::new();
    for record in records.into_iter().filter(|r| r.pipeline == pipeline) {
        match latest.iter_mut().find(|r| r.run_id == record.run_id) {
            Some(slot) => *slot = record,
            None => latest.push(record),
        }
    }
    latest
}

/// JSONL-backed registry at `<root>/runs.jsonl`.
#[derive(Debug, Clone)]
pub struct FileRunRegistry {
    path: PathBuf,
}

impl FileRunRegistry {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(RUNS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> RegistryError {
        RegistryError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_all(&self) -> Result<Vec<RunRecord>, RegistryError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_err(e)),
        };

        let mut records = Vec::new();
        for (i, line) in io::BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_err(e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = i + 1, error = %e, "skipping malformed run record"),
            }
        }
        Ok(records)
    }
}

impl RunRegistry for FileRunRegistry {
    fn record(&self, run: &RunRecord) -> Result<(), RegistryError> {
        let json = serde_json::to_string(run)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_err(e))?;
        writeln!(file, "{json}").map_err(|e| self.io_err(e))?;
        file.flush().map_err(|e| self.io_err(e))
    }

    fn runs(&self, pipeline: &str) -> Result<Vec<RunRecord>, RegistryError> {
        Ok(latest_per_run(self.read_all()?, pipeline))
    }
}

/// In-process registry for tests and one-shot tooling.
#[derive(Debug, Default)]
pub struct MemoryRunRegistry {
    records: RefCell<Vec<RunRecord>>,
}

impl MemoryRunRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RunRegistry for MemoryRunRegistry {
    fn record(&self, run: &RunRecord) -> Result<(), RegistryError> {
        self.records.borrow_mut().push(run.clone());
        Ok(())
    }

    fn runs(&self, pipeline: &str) -> Result<Vec<RunRecord>, RegistryError> {
        Ok(latest_per_run(self.records.borrow().iter().cloned(), pipeline))
    }
}
