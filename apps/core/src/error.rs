use thiserror::Error;

/// Engine-wide error type.
///
/// Only construction and administrative paths surface these. The per-request
/// pipeline degrades to an empty context instead of returning an error.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Represents configuration-related errors (e.g., unparsable environment variables).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Represents data validation errors (e.g., out-of-range thresholds).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Represents a rejected alias table (empty names, confidence outside [0, 1]).
    #[error("Alias table error: {0}")]
    AliasTable(String),

    /// Represents unexpected internal errors that indicate a bug.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Represents errors from operations that did not complete in time.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The bounded worker pool was closed while a request waited for a slot.
    #[error("Worker pool unavailable: {0}")]
    WorkerUnavailable(String),
}

impl Clone for EngineError {
    fn clone(&self) -> Self {
        match self {
            EngineError::Config(s) => EngineError::Config(s.clone()),
            EngineError::Validation(s) => EngineError::Validation(s.clone()),
            EngineError::AliasTable(s) => EngineError::AliasTable(s.clone()),
            EngineError::Internal(s) => EngineError::Internal(s.clone()),
            EngineError::Timeout(s) => EngineError::Timeout(s.clone()),
            EngineError::WorkerUnavailable(s) => EngineError::WorkerUnavailable(s.clone()),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, EngineError>;

impl From<tokio::time::error::Elapsed> for EngineError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        EngineError::Timeout(format!("Operation timed out: {}", err))
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Internal(format!("Worker task failed: {}", err))
    }
}

impl From<tokio::sync::AcquireError> for EngineError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        EngineError::WorkerUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Validation(format!("JSON error: {}", err))
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(err: validator::ValidationErrors) -> Self {
        EngineError::Validation(format!("Validation errors: {}", err))
    }
}

impl From<dotenv::Error> for EngineError {
    fn from(err: dotenv::Error) -> Self {
        EngineError::Config(format!("Failed to load .env file: {}", err))
    }
}
