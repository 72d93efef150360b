//! Engine error types

use thiserror::Error;

/// Errors that can occur in the settings engine
#[derive(Error, Debug)]
pub enum SettingsError {
    /// Input failed validation (unknown tier, bad rule kind, bad pattern, ...)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A rule id was not found on update/remove
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate pattern in the same tier and kind
    #[error("Conflict: {0}")]
    Conflict(String),

    /// IO error from the underlying store
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SettingsError {
    /// Create a validation error from a message
    pub fn validation(msg: impl Into<String>) -> Self {
        SettingsError::Validation(msg.into())
    }

    /// Create a not-found error from a message
    pub fn not_found(msg: impl Into<String>) -> Self {
        SettingsError::NotFound(msg.into())
    }

    /// Create a conflict error from a message
    pub fn conflict(msg: impl Into<String>) -> Self {
        SettingsError::Conflict(msg.into())
    }
}

/// Result type alias for engine operations
pub type SettingsResult<T> = Result<T, SettingsError>;
