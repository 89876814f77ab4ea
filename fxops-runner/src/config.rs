//! Workspace settings loaded from `fxops.toml`.
//!
//! Every section is optional; a missing file yields the defaults. The path
//! can be overridden with `FXOPS_CONFIG`.

use fxops_core::data::DEFAULT_BASE_URL;
use fxops_core::drift::DriftOptions;
use fxops_core::features::DEFAULT_LAGS;
use fxops_core::model::TrainConfig;
use fxops_core::CurrencyPair;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "fxops.toml";
pub const CONFIG_ENV: &str = "FXOPS_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub from_symbol: String,
    pub to_symbol: String,
    /// `full` or `compact`.
    pub output_size: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for DataSettings {
    fn default() -> Self {
        let pair = CurrencyPair::default();
        Self {
            from_symbol: pair.from,
            to_symbol: pair.to,
            output_size: "full".into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 30,
        }
    }
}

impl DataSettings {
    pub fn pair(&self) -> CurrencyPair {
        CurrencyPair::new(&self.from_symbol, &self.to_symbol)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSettings {
    pub lags: usize,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self { lags: DEFAULT_LAGS }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingSettings {
    pub test_fraction: f64,
    pub fit_intercept: bool,
    pub experiment: String,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        let train = TrainConfig::default();
        Self {
            test_fraction: train.test_fraction,
            fit_intercept: train.fit_intercept,
            experiment: crate::training::TRAINING_PIPELINE.into(),
        }
    }
}

impl TrainingSettings {
    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            test_fraction: self.test_fraction,
            fit_intercept: self.fit_intercept,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    /// Trailing rows of the reference data treated as current data.
    pub current_window: usize,
    /// A column drifts when its K-S p-value is below this.
    pub stattest_threshold: f64,
    /// The dataset drifts when at least this share of columns drift.
    pub drift_share: f64,
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        let drift = DriftOptions::default();
        Self {
            current_window: 100,
            stattest_threshold: drift.stattest_threshold,
            drift_share: drift.drift_share,
        }
    }
}

impl MonitoringSettings {
    pub fn drift_options(&self) -> DriftOptions {
        DriftOptions {
            stattest_threshold: self.stattest_threshold,
            drift_share: self.drift_share,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub artifact_root: PathBuf,
    pub tracking_root: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from(".fxops/artifacts"),
            tracking_root: PathBuf::from(".fxops/tracking"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
    pub data: DataSettings,
    pub features: FeatureSettings,
    pub training: TrainingSettings,
    pub monitoring: MonitoringSettings,
    pub storage: StorageSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            data: DataSettings::default(),
            features: FeatureSettings::default(),
            training: TrainingSettings::default(),
            monitoring: MonitoringSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    /// Load from `$FXOPS_CONFIG`, or `fxops.toml` in the working directory.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Load from `path`. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.features.lags == 0 {
            return Err(ConfigError::Invalid("features.lags must be at least 1".into()));
        }
        let frac = self.training.test_fraction;
        if !(frac > 0.0 && frac < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "training.test_fraction must be in (0, 1), got {frac}"
            )));
        }
        if self.monitoring.current_window == 0 {
            return Err(ConfigError::Invalid(
                "monitoring.current_window must be at least 1".into(),
            ));
        }
        let threshold = self.monitoring.stattest_threshold;
        if !(threshold > 0.0 && threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "monitoring.stattest_threshold must be in (0, 1), got {threshold}"
            )));
        }
        let share = self.monitoring.drift_share;
        if !(share > 0.0 && share <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "monitoring.drift_share must be in (0, 1], got {share}"
            )));
        }
        if !matches!(self.data.output_size.as_str(), "full" | "compact") {
            return Err(ConfigError::Invalid(format!(
                "data.output_size must be 'full' or 'compact', got '{}'",
                self.data.output_size
            )));
        }
        self.log_level
            .parse::<tracing::Level>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log_level '{}'", self.log_level)))?;
        Ok(())
    }

    /// Parsed `log_level`; `validate` guarantees it parses.
    pub fn tracing_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.data.pair().to_string(), "USD/INR");
        assert_eq!(settings.features.lags, 5);
        assert_eq!(settings.monitoring.current_window, 100);
        assert_eq!(settings.training.experiment, "fx_training_pipeline");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = Settings::from_toml(
            r#"
log_level = "debug"

[data]
to_symbol = "EUR"

[monitoring]
current_window = 30
stattest_threshold = 0.01
"#,
        )
        .unwrap();
        assert_eq!(settings.data.from_symbol, "USD");
        assert_eq!(settings.data.to_symbol, "EUR");
        assert_eq!(settings.monitoring.current_window, 30);
        assert_eq!(settings.monitoring.stattest_threshold, 0.01);
        assert_eq!(settings.monitoring.drift_share, 0.5);
        assert_eq!(settings.tracing_level(), tracing::Level::DEBUG);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for doc in [
            "[features]\nlags = 0",
            "[training]\ntest_fraction = 1.0",
            "[monitoring]\ncurrent_window = 0",
            "[data]\noutput_size = \"huge\"",
            "log_level = \"loud\"",
        ] {
            assert!(
                matches!(Settings::from_toml(doc), Err(ConfigError::Invalid(_))),
                "accepted: {doc}"
            );
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            Settings::from_toml("[data"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fxops.toml");
        fs::write(&path, "[storage]\nartifact_root = \"/tmp/fx\"\n").unwrap();
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.storage.artifact_root, PathBuf::from("/tmp/fx"));
    }
}
