//! Typed entities.

use crate::entity::Entity;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A typed domain payload with the fields sync needs.
///
/// `T`'s fields are flattened next to `id`, `lastModified` and `deleted`, so a
/// `Versioned<T>` has the same attribute-map shape as a
/// [`Record`](crate::Record) and converts to and from one losslessly.
///
/// ```rust
/// use hoard_core::{Entity, Record, Versioned};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Monster {
///     name: String,
///     hp: u32,
/// }
///
/// let goblin = Versioned::new("g1", 5, Monster { name: "Goblin".into(), hp: 7 });
/// let record = Record::from_entity(&goblin).unwrap();
/// let back: Versioned<Monster> = record.to_entity().unwrap();
///
/// assert_eq!(back, goblin);
/// assert_eq!(record.key().as_deref(), Some("g1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Entity identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Last modification timestamp.
    #[serde(rename = "lastModified", default)]
    pub last_modified: u64,
    /// Tombstone flag.
    #[serde(default)]
    pub deleted: bool,
    /// Domain fields.
    #[serde(flatten)]
    pub payload: T,
}

impl<T> Versioned<T> {
    /// Creates a live entity.
    pub fn new(id: impl Into<String>, last_modified: u64, payload: T) -> Self {
        Self {
            id: Some(id.into()),
            last_modified,
            deleted: false,
            payload,
        }
    }

    /// Returns a tombstoned copy stamped at `last_modified`.
    #[must_use]
    pub fn into_tombstone(mut self, last_modified: u64) -> Self {
        self.deleted = true;
        self.last_modified = last_modified;
        self
    }
}

impl<T> Entity for Versioned<T> {
    fn key(&self) -> Option<Cow<'_, str>> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(Cow::Borrowed)
    }

    fn last_modified(&self) -> u64 {
        self.last_modified
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}
