//! Data provider trait and structured error types.
//!
//! The DataProvider trait abstracts over quote sources so the training
//! pipeline can run against Alpha Vantage in production and a stub in tests.

use crate::frame::{Frame, FrameError};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Structured error types for data acquisition.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{env} is not set (add it to the environment or a .env file)")]
    MissingApiKey { env: &'static str },

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {provider}")]
    HttpStatus { provider: String, status: u16 },

    #[error("{provider} returned a message instead of CSV: {message}")]
    ProviderMessage { provider: String, message: String },

    #[error("CSV has no '{0}' column")]
    MissingColumn(String),

    #[error("CSV row {line}: cannot parse {column} value '{value}'")]
    Parse {
        line: u64,
        column: String,
        value: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
}

/// A foreign-exchange pair, e.g. USD/INR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Default for CurrencyPair {
    fn default() -> Self {
        Self::new("USD", "INR")
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

/// Trait for quote providers.
///
/// A provider returns the full daily series for a pair as a `Frame` with a
/// `timestamp` index and the provider's numeric columns.
pub trait DataProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the daily series for a currency pair.
    fn fetch(&self, pair: &CurrencyPair) -> Result<Frame, DataError>;
}
