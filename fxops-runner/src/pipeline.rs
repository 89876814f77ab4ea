//! Pipeline runs: sequential steps whose outputs become recorded artifacts.
//!
//! Each step output is saved by its materializer under
//! `<artifact_root>/<pipeline>/<run_id>/<step>/<output>/` before it is
//! recorded. A step that fails, or whose output cannot be saved, records
//! no outputs. Nothing is cached; every run recomputes every step.

use std::error::Error as StdError;
use std::path::Path;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, warn};

use fxops_core::{DataError, DriftError, FeatureError, ModelError};

use crate::artifacts::{
    ArtifactError, ArtifactStore, Materializer, MaterializerRegistry, Visualizations,
};
use crate::registry::{
    new_run_id, ArtifactRecord, RegistryError, RunRecord, RunRegistry, RunStatus, StepRecord,
};
use crate::tracking::TrackingError;

/// Why a step failed.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Drift(#[from] DriftError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error("output '{output}' of step '{step}' in run {run_id} cannot be read back")]
    ArtifactUnavailable {
        run_id: String,
        step: String,
        output: String,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("step '{step}' failed")]
    Step {
        step: String,
        #[source]
        source: StepError,
    },

    #[error("failed to record run: {0}")]
    Registry(#[from] RegistryError),

    #[error("failed to close tracking run: {0}")]
    Tracking(#[from] TrackingError),
}

/// Shared handles for every run: where artifacts go, how values are
/// stored, and where runs are recorded.
#[derive(Clone, Copy)]
pub struct PipelineEnv<'a> {
    pub store: &'a ArtifactStore,
    pub materializers: &'a MaterializerRegistry,
    pub registry: &'a dyn RunRegistry,
}

/// A finished run and the value its body produced.
#[derive(Debug)]
pub struct PipelineOutcome<V> {
    pub record: RunRecord,
    pub value: V,
}

/// One in-flight run of a pipeline.
pub struct PipelineRun<'a> {
    env: PipelineEnv<'a>,
    record: RunRecord,
}

impl<'a> PipelineRun<'a> {
    fn start(pipeline: &str, env: PipelineEnv<'a>) -> Result<Self, PipelineError> {
        let record = RunRecord::new(new_run_id(pipeline), pipeline);
        env.registry.record(&record)?;
        info!(pipeline, run_id = %record.run_id, "pipeline started");
        Ok(Self { env, record })
    }

    pub fn run_id(&self) -> &str {
        &self.record.run_id
    }

    pub fn record(&self) -> &RunRecord {
        &self.record
    }

    /// Run a step and save its output with the registered materializer
    /// for `T`.
    pub fn step<T, E, F>(&mut self, step: &str, output: &str, f: F) -> Result<T, PipelineError>
    where
        T: 'static,
        E: Into<StepError>,
        F: FnOnce() -> Result<T, E>,
    {
        let materializers = self.env.materializers;
        let resolved = materializers.get::<T>();
        self.execute(step, output, f, |value, uri| {
            let materializer = resolved?;
            save_output(&*materializer, value, uri)
        })
    }

    /// Run a step and save its output with `materializer` instead of the
    /// registered one.
    pub fn step_with_materializer<T, M, E, F>(
        &mut self,
        step: &str,
        output: &str,
        materializer: &M,
        f: F,
    ) -> Result<T, PipelineError>
    where
        T: 'static,
        M: Materializer<T> + ?Sized,
        E: Into<StepError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.execute(step, output, f, |value, uri| {
            save_output(materializer, value, uri)
        })
    }

    fn execute<T, E, F, S>(
        &mut self,
        step: &str,
        output: &str,
        f: F,
        save: S,
    ) -> Result<T, PipelineError>
    where
        T: 'static,
        E: Into<StepError>,
        F: FnOnce() -> Result<T, E>,
        S: FnOnce(&T, &Path) -> Result<(String, Visualizations), ArtifactError>,
    {
        let started_at = Utc::now();
        info!(pipeline = %self.record.pipeline, step, "step started");

        let result: Result<(T, ArtifactRecord, Visualizations), StepError> =
            f().map_err(Into::<StepError>::into).and_then(|value| {
                let (pipeline, run_id) = (&self.record.pipeline, &self.record.run_id);
                let uri = self.env.store.uri(pipeline, run_id, step, output)?;
                let (materializer, visualizations) = save(&value, &uri)?;
                let artifact = ArtifactRecord {
                    name: output.to_string(),
                    uri,
                    type_name: std::any::type_name::<T>().to_string(),
                    materializer,
                };
                Ok((value, artifact, visualizations))
            });

        let mut step_record = StepRecord {
            name: step.to_string(),
            status: RunStatus::Failed,
            started_at,
            finished_at: Some(Utc::now()),
            outputs: Vec::new(),
            visualizations: Visualizations::new(),
        };

        match result {
            Ok((value, artifact, visualizations)) => {
                step_record.status = RunStatus::Completed;
                step_record.outputs.push(artifact);
                step_record.visualizations = visualizations;
                self.record.steps.push(step_record);
                self.env.registry.record(&self.record)?;
                info!(pipeline = %self.record.pipeline, step, "step finished");
                Ok(value)
            }
            Err(source) => {
                self.record.steps.push(step_record);
                error!(pipeline = %self.record.pipeline, step, error = %source, "step failed");
                Err(PipelineError::Step {
                    step: step.to_string(),
                    source,
                })
            }
        }
    }

    fn finish(mut self, status: RunStatus, error: Option<String>) -> Result<RunRecord, PipelineError> {
        self.record.status = status;
        self.record.finished_at = Some(Utc::now());
        self.record.error = error;
        self.env.registry.record(&self.record)?;
        info!(
            pipeline = %self.record.pipeline,
            run_id = %self.record.run_id,
            status = ?status,
            "pipeline finished"
        );
        Ok(self.record)
    }
}

fn save_output<T, M: Materializer<T> + ?Sized>(
    materializer: &M,
    value: &T,
    uri: &Path,
) -> Result<(String, Visualizations), ArtifactError> {
    materializer.save(value, uri)?;
    let visualizations = materializer.save_visualizations(value, uri)?;
    Ok((materializer.name().to_string(), visualizations))
}

/// Run `body` as one run of `pipeline`.
///
/// The run is recorded as `running` before `body` starts and as
/// `completed` or `failed` after it returns. A body error is returned
/// after the failure has been recorded.
pub fn run_pipeline<'a, V, F>(
    pipeline: &str,
    env: PipelineEnv<'a>,
    body: F,
) -> Result<PipelineOutcome<V>, PipelineError>
where
    F: FnOnce(&mut PipelineRun<'a>) -> Result<V, PipelineError>,
{
    let mut run = PipelineRun::start(pipeline, env)?;
    match body(&mut run) {
        Ok(value) => {
            let record = run.finish(RunStatus::Completed, None)?;
            Ok(PipelineOutcome { record, value })
        }
        Err(e) => {
            if let Err(record_err) = run.finish(RunStatus::Failed, Some(error_chain(&e))) {
                warn!(error = %record_err, "could not record failed run");
            }
            Err(e)
        }
    }
}

/// `err: cause: cause ...` on one line.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
