//! Error taxonomy shared across the pipeline

use crate::{HypothesisId, Stage};
use thiserror::Error;

/// Violations of domain rules
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A frozen hypothesis cannot change certitude
    #[error("Hypothesis {0} is frozen")]
    FrozenHypothesis(HypothesisId),

    /// Stage transitions must move forward
    #[error("Illegal stage transition: {from} -> {to}")]
    IllegalTransition {
        /// Current stage
        from: Stage,
        /// Requested stage
        to: Stage,
    },

    /// A value outside its allowed range
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Errors surfaced by a pipeline run
///
/// A shortfall in verification is not an error: it ends the session in
/// `done_with_warning` and the unresolved claims travel in the final report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Malformed topic or configuration; never retried
    #[error("Invalid input: {0}")]
    Input(String),

    /// A collaborator failed after bounded retries; absorbed by the phase that saw it
    #[error("Collaborator failure: {0}")]
    TransientCollaborator(String),

    /// Corrupted session state or a violated invariant; the session is marked failed
    #[error("Fatal pipeline error: {0}")]
    Fatal(String),

    /// The session was cancelled at a stage boundary
    #[error("Session cancelled")]
    Cancelled,
}

impl From<DomainError> for PipelineError {
    fn from(e: DomainError) -> Self {
        PipelineError::Fatal(e.to_string())
    }
}
