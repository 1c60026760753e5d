//! Scrivener LLM Provider Layer
//!
//! Pluggable implementations of the `LlmProvider` trait from `scrivener-domain`,
//! the single text-reasoning capability the pipeline relies on.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scriptable mock for testing
//! - `OllamaProvider`: Local Ollama API integration
//!
//! # Examples
//!
//! ```
//! use scrivener_llm::MockProvider;
//! use scrivener_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new("Hello from LLM!");
//! let result = provider.generate("test prompt").unwrap();
//! assert_eq!(result, "Hello from LLM!");
//! ```

#![warn(missing_docs)]

pub mod ollama;

use scrivener_domain::traits::LlmProvider as LlmProviderTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use ollama::OllamaProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond(String),
    Fail,
}

#[derive(Debug, Default)]
struct MockState {
    exact: HashMap<String, Scripted>,
    containing: Vec<(String, Scripted)>,
    prompts: Vec<String>,
    failures_pending: usize,
}

/// Mock LLM provider for deterministic testing
///
/// Responses are looked up in order: an exact prompt match, then the first
/// registered fragment contained in the prompt, then the default response.
/// Clones share state, so a test can keep a handle after moving the provider
/// into the pipeline.
///
/// # Examples
///
/// ```
/// use scrivener_llm::MockProvider;
/// use scrivener_domain::traits::LlmProvider;
///
/// let provider = MockProvider::new("fallback");
/// provider.add_response("prompt1", "response1");
/// provider.add_rule("classify", r#"{"verdict": "buttress"}"#);
///
/// assert_eq!(provider.generate("prompt1").unwrap(), "response1");
/// assert_eq!(provider.generate("please classify this").unwrap(), r#"{"verdict": "buttress"}"#);
/// assert_eq!(provider.generate("other").unwrap(), "fallback");
/// assert_eq!(provider.call_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    state: Arc<Mutex<MockState>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A test that panicked mid-call leaves the data intact
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a specific response for an exact prompt
    pub fn add_response(&self, prompt: impl Into<String>, response: impl Into<String>) {
        self.state()
            .exact
            .insert(prompt.into(), Scripted::Respond(response.into()));
    }

    /// Respond to any prompt containing `fragment`
    ///
    /// Rules are tried in registration order.
    pub fn add_rule(&self, fragment: impl Into<String>, response: impl Into<String>) {
        self.state()
            .containing
            .push((fragment.into(), Scripted::Respond(response.into())));
    }

    /// Configure to return an error for a specific prompt
    pub fn add_error(&self, prompt: impl Into<String>) {
        self.state().exact.insert(prompt.into(), Scripted::Fail);
    }

    /// Return an error for any prompt containing `fragment`
    pub fn add_error_rule(&self, fragment: impl Into<String>) {
        self.state()
            .containing
            .push((fragment.into(), Scripted::Fail));
    }

    /// Fail the next `n` calls regardless of prompt
    pub fn fail_next(&self, n: usize) {
        self.state().failures_pending = n;
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        self.state().prompts.len()
    }

    /// Every prompt received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }

    /// Number of prompts received that contain `fragment`
    pub fn calls_containing(&self, fragment: &str) -> usize {
        self.state()
            .prompts
            .iter()
            .filter(|p| p.contains(fragment))
            .count()
    }

    /// Reset the call history
    pub fn reset_call_count(&self) {
        self.state().prompts.clear();
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, prompt: &str) -> Result<String, Self::Error> {
        let mut state = self.state();
        state.prompts.push(prompt.to_string());

        if state.failures_pending > 0 {
            state.failures_pending -= 1;
            return Err(LlmError::Communication("Mock transient failure".to_string()));
        }

        let scripted = state.exact.get(prompt).cloned().or_else(|| {
            state
                .containing
                .iter()
                .find(|(fragment, _)| prompt.contains(fragment.as_str()))
                .map(|(_, s)| s.clone())
        });

        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail) => Err(LlmError::Other("Mock error".to_string())),
            None => Ok(self.default_response.clone()),
        }
    }

    fn generate_structured(&self, prompt: &str, _schema: &str) -> Result<String, Self::Error> {
        self.generate(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_default() {
        let provider = MockProvider::new("Test response");
        assert_eq!(provider.generate("any prompt").unwrap(), "Test response");
    }

    #[test]
    fn test_mock_provider_specific_responses() {
        let provider = MockProvider::default();
        provider.add_response("hello", "world");
        provider.add_response("foo", "bar");

        assert_eq!(provider.generate("hello").unwrap(), "world");
        assert_eq!(provider.generate("foo").unwrap(), "bar");
        assert_eq!(provider.generate("unknown").unwrap(), "Default mock response");
    }

    #[test]
    fn test_exact_match_wins_over_rule() {
        let provider = MockProvider::default();
        provider.add_rule("hello", "from rule");
        provider.add_response("hello", "exact");

        assert_eq!(provider.generate("hello").unwrap(), "exact");
        assert_eq!(provider.generate("hello there").unwrap(), "from rule");
    }

    #[test]
    fn test_rules_in_registration_order() {
        let provider = MockProvider::default();
        provider.add_rule("claim", "first");
        provider.add_rule("claim about cats", "second");

        assert_eq!(provider.generate("a claim about cats").unwrap(), "first");
    }

    #[test]
    fn test_mock_provider_call_count() {
        let provider = MockProvider::new("test");
        assert_eq!(provider.call_count(), 0);

        provider.generate("prompt1").unwrap();
        provider.generate("prompt2").unwrap();
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.calls_containing("prompt"), 2);
        assert_eq!(provider.calls_containing("1"), 1);

        provider.reset_call_count();
        assert_eq!(provider.call_count(), 0);
    }

    #[test]
    fn test_mock_provider_error() {
        let provider = MockProvider::default();
        provider.add_error("bad prompt");
        provider.add_error_rule("poison");

        assert!(matches!(provider.generate("bad prompt"), Err(LlmError::Other(_))));
        assert!(provider.generate("contains poison here").is_err());
    }

    #[test]
    fn test_fail_next() {
        let provider = MockProvider::new("ok");
        provider.fail_next(2);

        assert!(matches!(provider.generate("a"), Err(LlmError::Communication(_))));
        assert!(provider.generate("b").is_err());
        assert_eq!(provider.generate("c").unwrap(), "ok");
    }

    #[test]
    fn test_mock_provider_clone_shares_state() {
        let provider1 = MockProvider::new("test");
        let provider2 = provider1.clone();

        provider1.generate("test").unwrap();
        provider2.add_rule("late", "added through clone");

        assert_eq!(provider1.call_count(), 1);
        assert_eq!(provider2.call_count(), 1);
        assert_eq!(provider1.generate("late rule").unwrap(), "added through clone");
    }
}
