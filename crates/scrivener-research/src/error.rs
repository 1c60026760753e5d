//! Error types for the research stages

use scrivener_domain::{DomainError, PipelineError};
use thiserror::Error;

/// Errors that can occur while running a research stage
#[derive(Error, Debug)]
pub enum ResearchError {
    /// Invalid topic or stage input
    #[error("Invalid input: {0}")]
    Input(String),

    /// A collaborator (reasoner, search, fetch) failed after retries
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// A collaborator call exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Reasoner output did not have the expected shape
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Domain rule violated
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ResearchError {
    /// Whether the failure came from an external collaborator
    pub fn is_transient(&self) -> bool {
        matches!(self, ResearchError::Collaborator(_) | ResearchError::Timeout(_))
    }
}

impl From<serde_json::Error> for ResearchError {
    fn from(e: serde_json::Error) -> Self {
        ResearchError::JsonParse(e.to_string())
    }
}

impl From<ResearchError> for PipelineError {
    fn from(e: ResearchError) -> Self {
        match e {
            ResearchError::Input(msg) | ResearchError::Config(msg) => PipelineError::Input(msg),
            ResearchError::Collaborator(msg) | ResearchError::Timeout(msg) => {
                PipelineError::TransientCollaborator(msg)
            }
            other => PipelineError::Fatal(other.to_string()),
        }
    }
}
