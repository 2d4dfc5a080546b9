//! Core type definitions.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of an entity type name.
const MAX_ENTITY_TYPE_LEN: usize = 64;

/// Name of an entity namespace (`"monsters"`, `"parties"`, ...).
///
/// Entity types double as storage namespaces, so names are restricted to
/// ASCII alphanumerics, `-` and `_`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityType(String);

impl EntityType {
    /// Creates a validated entity type.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidEntityType`] if the name is empty, longer
    /// than 64 bytes, or contains characters other than `[A-Za-z0-9_-]`.
    pub fn new(name: impl Into<String>) -> CoreResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(CoreError::invalid_entity_type(name, "must not be empty"));
        }
        if name.len() > MAX_ENTITY_TYPE_LEN {
            return Err(CoreError::invalid_entity_type(name, "longer than 64 bytes"));
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(CoreError::invalid_entity_type(
                name,
                "only ASCII alphanumerics, '-' and '_' are allowed",
            ));
        }
        Ok(Self(name))
    }

    /// Returns the name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityType({})", self.0)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityType {
    type Error = CoreError;

    fn try_from(value: String) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for EntityType {
    type Error = CoreError;

    fn try_from(value: &str) -> CoreResult<Self> {
        Self::new(value)
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        value.0
    }
}

/// One of the two copies of an entity collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Replica {
    /// The copy held by this process.
    Local,
    /// The copy held by the remote store.
    Remote,
}
