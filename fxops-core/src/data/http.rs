//! Blocking HTTP seam.
//!
//! Providers depend on `HttpClient` rather than on reqwest directly so tests
//! can count and script requests without a network.

use super::provider::DataError;
use std::time::Duration;

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait HttpClient {
    /// Issue a GET with the given query parameters and wait for the full body.
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, DataError>;
}

/// reqwest-backed client. No retries; the only limit is the request timeout.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fxops/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<HttpResponse, DataError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .map_err(|e| DataError::Network(e.without_url().to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .map_err(|e| DataError::Network(format!("failed to read response body: {e}")))?;
        Ok(HttpResponse { status, body })
    }
}
