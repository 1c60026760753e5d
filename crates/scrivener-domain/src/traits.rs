//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! All of them are synchronous; async callers run them on blocking threads.

use crate::{Artifact, Session, SessionId, StoredArtifact, TranscriptEntry};
use serde::{Deserialize, Serialize};

/// Trait for LLM provider operations (the single text-reasoning capability)
///
/// Implemented by the infrastructure layer (scrivener-llm)
pub trait LlmProvider {
    /// Error type for LLM operations
    type Error;

    /// Generate text completion
    fn generate(&self, prompt: &str) -> Result<String, Self::Error>;

    /// Generate output conforming to a JSON schema (if supported)
    fn generate_structured(&self, prompt: &str, schema: &str) -> Result<String, Self::Error>;
}

/// One web search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Result URL
    pub url: String,
    /// Page title
    #[serde(default)]
    pub title: String,
    /// Snippet or extracted page text
    #[serde(default)]
    pub snippet: String,
    /// Publication date, when the provider reports one
    #[serde(default)]
    pub date: Option<String>,
}

/// Trait for web search
///
/// Implemented by the infrastructure layer (scrivener-web)
pub trait SearchProvider {
    /// Error type for search operations
    type Error;

    /// Search the web, returning at most `max_results` hits
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, Self::Error>;

    /// The largest result count the provider supports
    fn max_results(&self) -> usize;
}

/// Trait for reaching and reading source URLs
///
/// Implemented by the infrastructure layer (scrivener-web)
pub trait ContentFetcher {
    /// Error type for fetch operations
    type Error;

    /// Probe a URL, returning the HTTP status code
    fn check(&self, url: &str) -> Result<u16, Self::Error>;

    /// Retrieve a URL's readable text
    fn fetch(&self, url: &str) -> Result<String, Self::Error>;
}

/// Whether a status code counts as reachable (2xx or 3xx)
pub fn is_reachable(status: u16) -> bool {
    (200..400).contains(&status)
}

/// Trait for persisting sessions and their artifacts
///
/// Implemented by the infrastructure layer (scrivener-store)
pub trait SessionStore {
    /// Error type for store operations
    type Error;

    /// Persist a new session
    fn create_session(&mut self, session: &Session) -> Result<(), Self::Error>;

    /// Overwrite a session's mutable fields (stage, status, counters)
    fn update_session(&mut self, session: &Session) -> Result<(), Self::Error>;

    /// Get a session by ID
    fn get_session(&self, id: SessionId) -> Result<Option<Session>, Self::Error>;

    /// List sessions, newest first
    fn list_sessions(&self) -> Result<Vec<Session>, Self::Error>;

    /// Append an artifact; fails if its key already exists for the session
    fn append_artifact(&mut self, id: SessionId, artifact: &Artifact) -> Result<u64, Self::Error>;

    /// Load a session's artifacts in append order
    fn load_artifacts(&self, id: SessionId) -> Result<Vec<StoredArtifact>, Self::Error>;

    /// Append a transcript line
    fn append_transcript(
        &mut self,
        id: SessionId,
        stage: &str,
        message: &str,
    ) -> Result<(), Self::Error>;

    /// Load the transcript in order
    fn load_transcript(&self, id: SessionId) -> Result<Vec<TranscriptEntry>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reachability() {
        assert!(is_reachable(200));
        assert!(is_reachable(301));
        assert!(is_reachable(399));
        assert!(!is_reachable(404));
        assert!(!is_reachable(500));
        assert!(!is_reachable(199));
    }
}
