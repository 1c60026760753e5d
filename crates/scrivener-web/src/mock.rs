//! Deterministic search and fetch mocks
//!
//! Both mocks share state across clones, so a test can keep a handle to
//! inspect call counts after handing the mock to the pipeline.

use crate::WebError;
use scrivener_domain::traits::{ContentFetcher, SearchHit, SearchProvider};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

#[derive(Debug, Default)]
struct SearchState {
    rules: Vec<(String, Vec<SearchHit>)>,
    failing: Vec<String>,
    queries: Vec<(String, usize)>,
}

/// Mock search provider
///
/// Queries are matched against registered fragments in registration order;
/// unmatched queries return no hits.
#[derive(Debug, Clone)]
pub struct MockSearch {
    max_results: usize,
    state: Arc<Mutex<SearchState>>,
}

impl MockSearch {
    /// Create a mock reporting `max_results` as its provider limit
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            state: Arc::new(Mutex::new(SearchState::default())),
        }
    }

    /// Return `hits` for any query containing `fragment`
    pub fn add_results(&self, fragment: impl Into<String>, hits: Vec<SearchHit>) {
        lock(&self.state).rules.push((fragment.into(), hits));
    }

    /// Fail any query containing `fragment`
    pub fn add_failure(&self, fragment: impl Into<String>) {
        lock(&self.state).failing.push(fragment.into());
    }

    /// Queries received with the requested result counts
    pub fn queries(&self) -> Vec<(String, usize)> {
        lock(&self.state).queries.clone()
    }

    /// Number of searches performed
    pub fn call_count(&self) -> usize {
        lock(&self.state).queries.len()
    }
}

impl Default for MockSearch {
    fn default() -> Self {
        Self::new(20)
    }
}

impl SearchProvider for MockSearch {
    type Error = WebError;

    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, Self::Error> {
        let mut state = lock(&self.state);
        state.queries.push((query.to_string(), max_results));

        if state.failing.iter().any(|f| query.contains(f.as_str())) {
            return Err(WebError::Mock(format!("search failed for '{}'", query)));
        }

        Ok(state
            .rules
            .iter()
            .find(|(fragment, _)| query.contains(fragment.as_str()))
            .map(|(_, hits)| hits.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }

    fn max_results(&self) -> usize {
        self.max_results
    }
}

#[derive(Debug, Default)]
struct FetchState {
    pages: HashMap<String, (u16, String)>,
    failing: Vec<String>,
    checks: Vec<String>,
    fetches: Vec<String>,
}

/// Mock content fetcher
///
/// Unregistered URLs answer 404.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<FetchState>>,
}

impl MockFetcher {
    /// Create an empty mock
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `content` with status 200 at `url`
    pub fn add_page(&self, url: impl Into<String>, content: impl Into<String>) {
        self.add_status(url, 200, content);
    }

    /// Serve `content` with an arbitrary status at `url`
    pub fn add_status(&self, url: impl Into<String>, status: u16, content: impl Into<String>) {
        lock(&self.state)
            .pages
            .insert(url.into(), (status, content.into()));
    }

    /// Fail every request to `url` with a network error
    pub fn add_failure(&self, url: impl Into<String>) {
        lock(&self.state).failing.push(url.into());
    }

    /// Number of reachability checks performed for `url`
    pub fn check_count(&self, url: &str) -> usize {
        lock(&self.state).checks.iter().filter(|u| *u == url).count()
    }

    /// Number of content fetches performed for `url`
    pub fn fetch_count(&self, url: &str) -> usize {
        lock(&self.state).fetches.iter().filter(|u| *u == url).count()
    }
}

impl ContentFetcher for MockFetcher {
    type Error = WebError;

    fn check(&self, url: &str) -> Result<u16, Self::Error> {
        let mut state = lock(&self.state);
        state.checks.push(url.to_string());
        if state.failing.iter().any(|f| f == url) {
            return Err(WebError::Mock(format!("connection refused: {}", url)));
        }
        Ok(state.pages.get(url).map(|(status, _)| *status).unwrap_or(404))
    }

    fn fetch(&self, url: &str) -> Result<String, Self::Error> {
        let mut state = lock(&self.state);
        state.fetches.push(url.to_string());
        if state.failing.iter().any(|f| f == url) {
            return Err(WebError::Mock(format!("connection refused: {}", url)));
        }
        match state.pages.get(url) {
            Some((status, content)) if (200..300).contains(status) => Ok(content.clone()),
            Some((status, _)) => Err(WebError::Status(*status)),
            None => Err(WebError::Status(404)),
        }
    }
}
