//! HTTP content fetcher
//!
//! `check` tests reachability with a HEAD request, falling back to GET for
//! servers that refuse HEAD. `fetch` downloads the page and reduces HTML to
//! readable text, bounded in size.

use crate::{html, parse_http_url, WebError};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use scrivener_domain::traits::ContentFetcher;
use scrivener_domain::truncate_chars;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for the HTTP fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Request timeout (seconds)
    pub timeout_secs: u64,
    /// Maximum characters of text kept per page
    pub max_content_chars: usize,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_content_chars: 10_000,
            user_agent: "Mozilla/5.0 (compatible; Scrivener/0.1; citation verifier)".to_string(),
        }
    }
}

/// Blocking HTTP implementation of `ContentFetcher`
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    config: FetcherConfig,
}

impl HttpFetcher {
    /// Create a fetcher with the given configuration
    pub fn new(config: FetcherConfig) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self { client, config }
    }

    /// Create a fetcher with default settings
    pub fn default_config() -> Self {
        Self::new(FetcherConfig::default())
    }
}

impl ContentFetcher for HttpFetcher {
    type Error = WebError;

    fn check(&self, url: &str) -> Result<u16, Self::Error> {
        let url = parse_http_url(url)?;
        let response = self
            .client
            .head(url.clone())
            .header(USER_AGENT, &self.config.user_agent)
            .send()?;

        let status = response.status();
        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            debug!("HEAD refused by {}, retrying with GET", url);
            let response = self
                .client
                .get(url)
                .header(USER_AGENT, &self.config.user_agent)
                .send()?;
            return Ok(response.status().as_u16());
        }
        Ok(status.as_u16())
    }

    fn fetch(&self, url: &str) -> Result<String, Self::Error> {
        let url = parse_http_url(url)?;
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.config.user_agent)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebError::Status(status.as_u16()));
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(false);
        let body = response.text()?;

        let text = if is_html || html::looks_like_html(&body) {
            html::html_to_text(&body)
        } else {
            html::collapse_whitespace(&body)
        };
        Ok(truncate_chars(&text, self.config.max_content_chars))
    }
}
