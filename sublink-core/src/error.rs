//! Engine error taxonomy

use thiserror::Error;

use crate::api::ApiError;

/// Errors surfaced by the navigation and sync engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Rejected locally, never reaches the network
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Batch fetch failed or returned a malformed response.
    /// `status` is `None` when the request never got a response.
    #[error("Failed to load alignments (status {status:?}): {body}")]
    LoadFailure { status: Option<u16>, body: String },

    /// Progress write failed. Recovered through the offline queue.
    #[error("Progress sync failed: {0}")]
    SyncFailure(String),

    /// Local state failed validation and was discarded
    #[error("Stored state for {key} is corrupt: {reason}")]
    StorageCorruption { key: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session is closed")]
    SessionClosed,
}

impl EngineError {
    /// Build a `LoadFailure` from an API error
    pub fn load_failure(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, body } => EngineError::LoadFailure {
                status: Some(status),
                body,
            },
            ApiError::Decode { status, message } => EngineError::LoadFailure {
                status: Some(status),
                body: message,
            },
            other => EngineError::LoadFailure {
                status: None,
                body: other.to_string(),
            },
        }
    }

    /// Whether this error came from a batch fetch
    pub fn is_load_failure(&self) -> bool {
        matches!(self, EngineError::LoadFailure { .. })
    }
}

/// Result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
