//! Error types for the research service

use scrivener_domain::{PipelineError, SessionId};
use scrivener_research::ResearchError;
use thiserror::Error;

/// Errors returned by [`ResearchService`](crate::ResearchService) calls
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Invalid topic or configuration
    #[error("Invalid input: {0}")]
    Input(String),

    /// No session with this id
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// The session is being run right now
    #[error("Session {0} is already running")]
    AlreadyRunning(SessionId),

    /// The session finished and cannot be resumed
    #[error("Session {0} is already finished")]
    AlreadyFinished(SessionId),

    /// The final report does not exist yet
    #[error("Report not ready: {0}")]
    NotReady(String),

    /// Too many sessions running at once
    #[error("Service busy: {0} sessions running")]
    Busy(usize),

    /// Session store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Pipeline failure
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<ResearchError> for ServiceError {
    fn from(e: ResearchError) -> Self {
        ServiceError::Input(e.to_string())
    }
}
