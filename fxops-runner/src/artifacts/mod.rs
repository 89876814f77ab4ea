//! Artifact storage: per-output directories, materializers, visualizations.
//!
//! Layout: `<root>/<pipeline>/<run_id>/<step>/<output>/`. A materializer
//! owns the directory it is handed and writes nothing outside it.

mod drift_report;
mod frame;
mod json;
mod materializer;

pub use drift_report::{DriftReportMaterializer, REPORT_HTML, REPORT_JSON};
pub use frame::{FrameMaterializer, FrameSchema, PARQUET_FILE, SCHEMA_FILE};
pub use json::{JsonMaterializer, MODEL_FILE};
pub use materializer::{Materializer, MaterializerRegistry};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::registry::ArtifactRecord;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("artifact JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error(transparent)]
    Drift(#[from] fxops_core::DriftError),

    #[error(transparent)]
    Frame(#[from] fxops_core::FrameError),

    #[error("no materializer registered for {type_name}")]
    NoMaterializer { type_name: &'static str },

    #[error("artifact holds {recorded}, requested {requested}")]
    TypeMismatch {
        recorded: String,
        requested: &'static str,
    },

    #[error("corrupt artifact at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl ArtifactError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Kind of a saved visualization file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisualizationType {
    Html,
}

/// Visualization file path → its type.
pub type Visualizations = BTreeMap<PathBuf, VisualizationType>;

/// Assigns artifact URIs under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory for one step output and return its absolute
    /// path, so recorded URIs resolve from any working directory.
    pub fn uri(
        &self,
        pipeline: &str,
        run_id: &str,
        step: &str,
        output: &str,
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self
            .root
            .join(pipeline)
            .join(run_id)
            .join(step)
            .join(output);
        fs::create_dir_all(&dir).map_err(|e| ArtifactError::io(&dir, e))?;
        fs::canonicalize(&dir).map_err(|e| ArtifactError::io(&dir, e))
    }
}

/// Load a recorded artifact as `T` through the registry.
///
/// Fails if the record was written for a different value type. `Ok(None)`
/// means the materializer does not support reading back.
pub fn load_artifact<T: 'static>(
    materializers: &MaterializerRegistry,
    record: &ArtifactRecord,
) -> Result<Option<T>, ArtifactError> {
    let requested = std::any::type_name::<T>();
    if record.type_name != requested {
        return Err(ArtifactError::TypeMismatch {
            recorded: record.type_name.clone(),
            requested,
        });
    }
    materializers.get::<T>()?.load(&record.uri)
}

pub(crate) fn write_file(path: &Path, bytes: impl AsRef<[u8]>) -> Result<(), ArtifactError> {
    fs::write(path, bytes).map_err(|e| ArtifactError::io(path, e))
}

pub(crate) fn read_file(path: &Path) -> Result<String, ArtifactError> {
    fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))
}
