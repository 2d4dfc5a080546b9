//! Entity model.

mod id;
mod record;
mod versioned;

pub use id::{IdGenerator, SequentialIdGenerator, UuidGenerator};
pub use record::{Record, DELETED_FIELD, ID_FIELD, LAST_MODIFIED_FIELD, LEGACY_ID_FIELD};
pub use versioned::Versioned;

use std::borrow::Cow;

/// The fields the merge engine reads from an entity.
///
/// Everything else about an entity is opaque payload. Implementors only have
/// to expose a stable key, a modification timestamp and a tombstone flag.
///
/// # Invariants
///
/// - `key` is assigned at creation and never changes
/// - `last_modified` grows on every mutation; `0` means "never stamped" and
///   compares older than any stamped version
/// - a deletion is `is_deleted() == true`, never a missing entity
pub trait Entity {
    /// Returns the entity's key, or `None` if it has no usable identifier.
    ///
    /// Scalar identifiers that are not strings are keyed by their textual
    /// form, so `7` and `"7"` name the same entity.
    fn key(&self) -> Option<Cow<'_, str>>;

    /// Returns the last modification timestamp (0 when absent).
    fn last_modified(&self) -> u64;

    /// Returns true if this version is a tombstone.
    fn is_deleted(&self) -> bool;
}

impl<E: Entity + ?Sized> Entity for &E {
    fn key(&self) -> Option<Cow<'_, str>> {
        (**self).key()
    }

    fn last_modified(&self) -> u64 {
        (**self).last_modified()
    }

    fn is_deleted(&self) -> bool {
        (**self).is_deleted()
    }
}
