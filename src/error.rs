//! Error types for Reqsmith
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in Reqsmith
#[derive(Debug, Error)]
pub enum ReqsmithError {
    /// Job not found in the store
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Job input payload cannot be interpreted by a strategy
    #[error("Invalid input payload: {0}")]
    InvalidInput(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Prompt catalog error (missing file, malformed tables)
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for ReqsmithError {
    fn from(e: rusqlite::Error) -> Self {
        ReqsmithError::Storage(e.to_string())
    }
}

/// Result type alias for Reqsmith operations
pub type Result<T> = std::result::Result<T, ReqsmithError>;
