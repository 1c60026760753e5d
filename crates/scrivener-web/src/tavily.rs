//! Tavily search provider
//!
//! Uses the advanced search depth and asks for raw page content so the
//! gatherer can quote from sources without a second fetch.

use crate::{html, WebError};
use scrivener_domain::traits::{SearchHit, SearchProvider};
use scrivener_domain::truncate_chars;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default Tavily API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.tavily.com";

/// Largest result count Tavily accepts per query
pub const MAX_RESULTS: usize = 20;

/// Characters of raw content kept per hit
pub const MAX_SNIPPET_CHARS: usize = 4000;

/// Default request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Tavily search API client
pub struct TavilySearch {
    endpoint: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_raw_content: bool,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    raw_content: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
}

impl TavilySearch {
    /// Create a client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key)
    }

    /// Create a client against a custom endpoint
    pub fn with_endpoint(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }
}

fn parse_response(body: &str) -> Result<Vec<SearchHit>, WebError> {
    let response: TavilyResponse = serde_json::from_str(body)
        .map_err(|e| WebError::InvalidResponse(format!("Tavily response: {}", e)))?;

    Ok(response
        .results
        .into_iter()
        .filter(|r| !r.url.trim().is_empty())
        .map(|r| {
            // Prefer raw page text; fall back to Tavily's extracted summary
            let text = r
                .raw_content
                .filter(|raw| !raw.trim().is_empty())
                .unwrap_or(r.content);
            SearchHit {
                url: r.url,
                title: r.title,
                snippet: truncate_chars(&html::collapse_whitespace(&text), MAX_SNIPPET_CHARS),
                date: r.published_date,
            }
        })
        .collect())
}

impl SearchProvider for TavilySearch {
    type Error = WebError;

    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, Self::Error> {
        if self.api_key.trim().is_empty() {
            return Err(WebError::MissingApiKey("Tavily".to_string()));
        }
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            max_results: max_results.clamp(1, MAX_RESULTS),
            search_depth: "advanced",
            include_raw_content: true,
        };

        debug!("Tavily search: '{}'", query);
        let response = self
            .client
            .post(format!("{}/search", self.endpoint))
            .json(&request)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebError::Status(status.as_u16()));
        }

        let body = response.text()?;
        parse_response(&body)
    }

    fn max_results(&self) -> usize {
        MAX_RESULTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response_prefers_raw_content() {
        let body = r#"{
            "query": "rust safety",
            "results": [
                {"url": "https://a.org", "title": "A", "content": "summary",
                 "raw_content": "full   page\n text", "published_date": "2024-01-02", "score": 0.9},
                {"url": "https://b.org", "title": "B", "content": "only summary", "raw_content": null},
                {"url": "", "title": "empty", "content": "dropped"}
            ]
        }"#;

        let hits = parse_response(body).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "full page text");
        assert_eq!(hits[0].date.as_deref(), Some("2024-01-02"));
        assert_eq!(hits[1].snippet, "only summary");
        assert_eq!(hits[1].date, None);
    }

    #[test]
    fn test_parse_response_rejects_garbage() {
        assert!(matches!(parse_response("not json"), Err(WebError::InvalidResponse(_))));
        assert!(parse_response("{}").unwrap().is_empty());
    }

    #[test]
    fn test_request_shape() {
        let request = TavilyRequest {
            api_key: "k",
            query: "q",
            max_results: 20,
            search_depth: "advanced",
            include_raw_content: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["search_depth"], "advanced");
        assert_eq!(json["include_raw_content"], true);
        assert_eq!(json["max_results"], 20);
    }

    #[test]
    fn test_max_results_is_provider_limit() {
        let search = TavilySearch::new("key");
        assert_eq!(search.max_results(), MAX_RESULTS);
    }

    #[test]
    fn test_blank_key_fails_without_request() {
        let search = TavilySearch::with_endpoint("http://127.0.0.1:9", " ");
        assert!(matches!(search.search("q", 5), Err(WebError::MissingApiKey(_))));
    }
}
