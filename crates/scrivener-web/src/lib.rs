//! Scrivener Web Layer
//!
//! Implementations of the `SearchProvider` and `ContentFetcher` traits from
//! `scrivener-domain`.
//!
//! # Collaborators
//!
//! - `TavilySearch`: Tavily search API (advanced depth, raw content)
//! - `HttpFetcher`: HEAD/GET source retrieval with HTML to text extraction
//! - `MockSearch` / `MockFetcher`: Deterministic mocks for testing
//!
//! All clients are blocking; the pipeline calls them from `spawn_blocking`
//! workers under a timeout.

#![warn(missing_docs)]

pub mod fetch;
pub mod html;
pub mod mock;
pub mod tavily;

use thiserror::Error;

pub use fetch::{FetcherConfig, HttpFetcher};
pub use html::html_to_text;
pub use mock::{MockFetcher, MockSearch};
pub use tavily::TavilySearch;

/// Errors that can occur talking to the web
#[derive(Error, Debug)]
pub enum WebError {
    /// Server answered with a non-success status
    #[error("HTTP {0}")]
    Status(u16),

    /// Network failure or timeout
    #[error("Request failed: {0}")]
    Request(String),

    /// URL failed to parse or is not http(s)
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Provider needs an API key that was not configured
    #[error("Missing API key for {0}")]
    MissingApiKey(String),

    /// Scripted failure from a mock
    #[error("Mock error: {0}")]
    Mock(String),
}

impl From<reqwest::Error> for WebError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => WebError::Status(status.as_u16()),
            None => WebError::Request(e.to_string()),
        }
    }
}

/// Parse and validate an http(s) URL
pub fn parse_http_url(raw: &str) -> Result<url::Url, WebError> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| WebError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(WebError::InvalidUrl(format!("unsupported scheme '{}'", other))),
    }
}
