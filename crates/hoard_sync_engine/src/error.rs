//! Error types for the sync engine.

use hoard_storage::StorageError;
use std::fmt;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote did not answer in time.
    #[error("operation timed out")]
    Timeout,

    /// The remote failed while handling the request.
    #[error("server error: {0}")]
    ServerError(String),

    /// The remote refused the request (bad payload, conflict, ...).
    #[error("rejected by remote: {0}")]
    Rejected(String),

    /// The remote rejected our credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Local storage error during sync.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Response body could not be decoded.
    #[error("codec error: {0}")]
    Codec(String),
}

/// Coarse failure category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Remote unreachable, slow, or misbehaving. Recovered by retrying.
    Network,
    /// Credentials rejected. The application should re-authenticate.
    Auth,
    /// The local store failed.
    Storage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Network => "network",
            FailureKind::Auth => "auth",
            FailureKind::Storage => "storage",
        };
        f.write_str(name)
    }
}

impl SyncError {
    /// Creates a retryable network error.
    pub fn network_retryable(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable network error.
    pub fn network_fatal(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Network { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            SyncError::ServerError(_) => true,
            _ => false,
        }
    }

    /// Returns the failure category.
    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::AuthFailed(_) => FailureKind::Auth,
            SyncError::Storage(_) => FailureKind::Storage,
            SyncError::Network { .. }
            | SyncError::Timeout
            | SyncError::ServerError(_)
            | SyncError::Rejected(_)
            | SyncError::Codec(_) => FailureKind::Network,
        }
    }
}
