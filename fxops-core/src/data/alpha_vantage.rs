//! Alpha Vantage FX_DAILY provider.
//!
//! One GET per fetch, CSV response. There are no retries: a non-2xx status,
//! a transport failure or an in-band error message fails the fetch.
//!
//! Alpha Vantage answers some failures (bad key, rate limit) with HTTP 200
//! and a small JSON object; those are surfaced as `ProviderMessage`.

use super::http::HttpClient;
use super::parse::parse_csv;
use super::provider::{CurrencyPair, DataError, DataProvider};
use crate::frame::Frame;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "ALPHA_VANTAGE_API_KEY";

const PROVIDER_NAME: &str = "alpha_vantage";

/// Read the API key from the process environment. Blank values count as unset.
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty())
}

pub struct AlphaVantageProvider<'a> {
    client: &'a dyn HttpClient,
    api_key: Option<String>,
    base_url: String,
    output_size: String,
}

impl<'a> AlphaVantageProvider<'a> {
    pub fn new(client: &'a dyn HttpClient, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            output_size: "full".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// `full` (entire history) or `compact` (latest 100 points).
    pub fn with_output_size(mut self, output_size: impl Into<String>) -> Self {
        self.output_size = output_size.into();
        self
    }

    fn api_key(&self) -> Result<&str, DataError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(DataError::MissingApiKey { env: API_KEY_ENV })
    }
}

impl DataProvider for AlphaVantageProvider<'_> {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn fetch(&self, pair: &CurrencyPair) -> Result<Frame, DataError> {
        let api_key = self.api_key()?;

        let query = [
            ("function", "FX_DAILY"),
            ("from_symbol", pair.from.as_str()),
            ("to_symbol", pair.to.as_str()),
            ("outputsize", self.output_size.as_str()),
            ("apikey", api_key),
            ("datatype", "csv"),
        ];
        debug!(url = %self.base_url, %pair, output_size = %self.output_size, "requesting FX_DAILY");

        let resp = self.client.get(&self.base_url, &query)?;
        if !resp.is_success() {
            return Err(DataError::HttpStatus {
                provider: PROVIDER_NAME.to_string(),
                status: resp.status,
            });
        }

        if let Some(message) = in_band_message(&resp.body) {
            return Err(DataError::ProviderMessage {
                provider: PROVIDER_NAME.to_string(),
                message,
            });
        }

        let frame = parse_csv(&resp.body)?;
        info!(%pair, rows = frame.height(), "fetched FX series");
        Ok(frame)
    }
}

/// Extract the message from a JSON body such as `{"Error Message": "..."}`.
fn in_band_message(body: &str) -> Option<String> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('{') {
        return None;
    }
    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(_) => return Some(trimmed.chars().take(200).collect()),
    };
    ["Error Message", "Information", "Note"]
        .iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()).map(str::to_string))
        .or_else(|| Some(value.to_string()))
}
