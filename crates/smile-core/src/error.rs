//! ============================================================================
//! Error Types - Failure taxonomy for runs, storage and upstream calls
//! ============================================================================
//! - InvalidArgument: bad counts, empty wallet lists (nothing persisted)
//! - UnsupportedTask: fatal to one wallet's task loop only
//! - Storage: surfaced to the caller, the run stops
//! - TransientOperationFailure: recorded per wallet / step, never retried
//! ============================================================================

use thiserror::Error;

pub use crate::db::StorageError;

pub type Result<T, E = SmileError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SmileError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported task: {0}")]
    UnsupportedTask(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("operation failed: {0}")]
    TransientOperationFailure(String),

    /// A second run was requested while one is still holding the controller.
    #[error("a run is already active")]
    RunAlreadyActive,

    /// Payload from upstream (or a stored job) could not be decoded,
    /// including task kinds outside the known set.
    #[error("decode error: {0}")]
    Decode(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SmileError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether the failure only affects the current wallet or step.
    pub fn is_per_unit(&self) -> bool {
        matches!(
            self,
            SmileError::UnsupportedTask(_) | SmileError::TransientOperationFailure(_)
        )
    }
}

impl From<serde_json::Error> for SmileError {
    fn from(e: serde_json::Error) -> Self {
        SmileError::Decode(e.to_string())
    }
}

impl From<reqwest::Error> for SmileError {
    fn from(e: reqwest::Error) -> Self {
        SmileError::Upstream(e.to_string())
    }
}
