//! The `Materializer` capability and the type → materializer registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use fxops_core::{DriftReport, Frame, TrainingOutcome};

use super::{
    ArtifactError, DriftReportMaterializer, FrameMaterializer, JsonMaterializer, Visualizations,
    MODEL_FILE,
};

/// Persists values of one type inside an artifact directory.
pub trait Materializer<T>: Send + Sync {
    /// Short name recorded alongside each artifact.
    fn name(&self) -> &str;

    /// Write `value` into `uri`.
    fn save(&self, value: &T, uri: &Path) -> Result<(), ArtifactError>;

    /// Read a value back from `uri`. `Ok(None)` when read-back is not
    /// supported for this type.
    fn load(&self, uri: &Path) -> Result<Option<T>, ArtifactError>;

    /// Write human-facing renderings of `value` into `uri`.
    fn save_visualizations(&self, _value: &T, _uri: &Path) -> Result<Visualizations, ArtifactError> {
        Ok(Visualizations::new())
    }
}

/// Explicit mapping from value type to its materializer.
#[derive(Default)]
pub struct MaterializerRegistry {
    // Each value is an `Arc<dyn Materializer<T>>` for the keyed `T`.
    entries: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl MaterializerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in materializers for frames, training
    /// outcomes and drift reports.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<Frame>(FrameMaterializer);
        registry.register::<TrainingOutcome>(JsonMaterializer::<TrainingOutcome>::new(
            "training_outcome",
            MODEL_FILE,
        ));
        registry.register::<DriftReport>(DriftReportMaterializer);
        registry
    }

    /// Register (or replace) the materializer for `T`.
    pub fn register<T: 'static>(&mut self, materializer: impl Materializer<T> + 'static) {
        let arc: Arc<dyn Materializer<T>> = Arc::new(materializer);
        self.entries.insert(TypeId::of::<T>(), Box::new(arc));
    }

    pub fn get<T: 'static>(&self) -> Result<Arc<dyn Materializer<T>>, ArtifactError> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Materializer<T>>>())
            .cloned()
            .ok_or(ArtifactError::NoMaterializer {
                type_name: std::any::type_name::<T>(),
            })
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }
}
