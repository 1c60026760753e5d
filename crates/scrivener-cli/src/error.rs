//! Error types for the CLI application.

use scrivener_domain::SessionId;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Research service error
    #[error(transparent)]
    Service(#[from] scrivener_pipeline::ServiceError),

    /// Session store error
    #[error("Store error: {0}")]
    Store(#[from] scrivener_store::StoreError),

    /// The session ran and failed
    #[error("Session {id} failed: {reason}")]
    SessionFailed {
        /// Session id
        id: SessionId,
        /// Recorded error
        reason: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
