//! Error types for launchdeck

use openapi_models::ValidationError;
use thiserror::Error;

/// Main error type for launchdeck
#[derive(Error, Debug)]
pub enum DeckError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    /// Subdomain already taken; carries an alternative that is never auto-applied
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        suggestion: Option<String>,
    },

    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Response did not match the expected shape. Never retried.
    #[error("Unexpected server response: {0}")]
    SchemaMismatch(String),

    /// Non-2xx response from the platform API
    #[error("API error ({status}): {code}: {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
        suggestion: Option<String>,
    },

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeckError {
    pub fn conflict(message: impl Into<String>, suggestion: Option<String>) -> Self {
        DeckError::Conflict {
            message: message.into(),
            suggestion,
        }
    }
}

impl From<anyhow::Error> for DeckError {
    fn from(err: anyhow::Error) -> Self {
        DeckError::Internal(err.to_string())
    }
}
