//! Single-file JSON storage for any serde value.

use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{read_file, write_file, ArtifactError, Materializer};

/// File name used for trained model artifacts.
pub const MODEL_FILE: &str = "model.json";

pub struct JsonMaterializer<T> {
    name: &'static str,
    file: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonMaterializer<T> {
    pub fn new(name: &'static str, file: &'static str) -> Self {
        Self {
            name,
            file,
            _marker: PhantomData,
        }
    }
}

impl<T> Materializer<T> for JsonMaterializer<T>
where
    T: Serialize + DeserializeOwned,
{
    fn name(&self) -> &str {
        self.name
    }

    fn save(&self, value: &T, uri: &Path) -> Result<(), ArtifactError> {
        write_file(&uri.join(self.file), serde_json::to_string_pretty(value)?)
    }

    fn load(&self, uri: &Path) -> Result<Option<T>, ArtifactError> {
        let text = read_file(&uri.join(self.file))?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use fxops_core::features::make_lag_features;
    use fxops_core::model::{train, TrainConfig};
    use fxops_core::{Frame, TrainingOutcome};

    fn outcome() -> TrainingOutcome {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let dates = (0..20).map(|i| start + chrono::Duration::days(i)).collect();
        let raw = Frame::new(dates)
            .with_column("close", (0..20).map(|i| 80.0 + (i as f64).sin()).collect())
            .unwrap();
        let features = make_lag_features(&raw, 3).unwrap();
        train(&features, &TrainConfig::default()).unwrap()
    }

    #[test]
    fn training_outcome_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let m = JsonMaterializer::<TrainingOutcome>::new("training_outcome", MODEL_FILE);
        let value = outcome();
        m.save(&value, dir.path()).unwrap();

        let text = std::fs::read_to_string(dir.path().join(MODEL_FILE)).unwrap();
        assert!(text.contains("\"coefficients\""));
        assert!(text.contains("\"rmse\""));
        assert_eq!(m.load(dir.path()).unwrap(), Some(value));
    }

    #[test]
    fn floats_reload_bit_for_bit() {
        let dir = tempfile::tempdir().unwrap();
        let m = JsonMaterializer::<Vec<f64>>::new("floats", "floats.json");
        let values = vec![7.767245836022269e-29, 0.1 + 0.2, f64::MIN_POSITIVE, 1e308];
        m.save(&values, dir.path()).unwrap();
        let loaded = m.load(dir.path()).unwrap().unwrap();
        let bits = |v: &[f64]| v.iter().map(|x| x.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(&loaded), bits(&values));
    }

    #[test]
    fn garbage_file_is_a_json_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE), "not json").unwrap();
        let m = JsonMaterializer::<TrainingOutcome>::new("training_outcome", MODEL_FILE);
        assert!(matches!(m.load(dir.path()), Err(ArtifactError::Json(_))));
    }
}
