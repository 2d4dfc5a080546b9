//! Error types for hoard core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in hoard core operations.
///
/// The merge engine itself never fails; these errors come from building
/// entities and entity types out of untrusted input.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity type name is not usable as a namespace.
    #[error("invalid entity type {name:?}: {reason}")]
    InvalidEntityType {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Attempted to overwrite a field owned by the sync layer.
    #[error("field {field:?} is reserved and cannot be set directly")]
    ReservedField {
        /// The reserved field name.
        field: String,
    },

    /// A record must be a JSON object.
    #[error("record must be a JSON object, got {found}")]
    NotAnObject {
        /// The JSON kind that was found instead.
        found: &'static str,
    },

    /// Payload (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates an invalid entity type error.
    pub fn invalid_entity_type(name: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidEntityType {
            name: name.into(),
            reason,
        }
    }
}
