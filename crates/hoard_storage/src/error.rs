//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Every variant is fatal to the operation that produced it. Callers decide
/// whether to carry on without local persistence.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A namespace file could not be parsed.
    #[error("storage corrupted: {0}")]
    Corrupted(String),

    /// A record without a usable `id` cannot be stored.
    #[error("record has no usable id (entity type {entity_type})")]
    MissingKey {
        /// The namespace the write targeted.
        entity_type: String,
    },

    /// The storage medium is unavailable (disabled, quota exceeded, ...).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A path component supplied by the caller is not usable.
    #[error("invalid path component: {0}")]
    InvalidPath(String),

    /// Another process holds the store.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// Record serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Creates a missing-key error for a namespace.
    pub fn missing_key(entity_type: impl ToString) -> Self {
        Self::MissingKey {
            entity_type: entity_type.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            StorageError::missing_key("monsters").to_string(),
            "record has no usable id (entity type monsters)"
        );
        assert_eq!(
            StorageError::Locked.to_string(),
            "store locked: another process has exclusive access"
        );
    }
}
