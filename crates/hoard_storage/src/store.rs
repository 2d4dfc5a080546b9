//! Local store trait definition.

use crate::error::StorageResult;
use hoard_core::{EntityType, Record};

/// The device-local copy of every entity type.
///
/// # Invariants
///
/// - Records are keyed by `(entity_type, id)`; an id appears at most once per
///   entity type
/// - A read observes every write that returned `Ok` before it
/// - `replace_all` is atomic: readers see the old namespace or the new one,
///   never a mix
/// - Stores must be `Send + Sync` so attempts for different entity types can
///   share one store
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait LocalStore: Send + Sync {
    /// Gets a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn get(&self, entity_type: &EntityType, id: &str) -> StorageResult<Option<Record>>;

    /// Inserts or overwrites a record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingKey`](crate::StorageError::MissingKey)
    /// if the record has no usable id, or an error if the write is rejected.
    fn put(&self, entity_type: &EntityType, record: Record) -> StorageResult<()>;

    /// Physically removes a record. Removing an absent id is not an error.
    ///
    /// This is "forget locally", not a synced deletion: to delete an entity
    /// everywhere, write a tombstone with [`LocalStore::put`].
    ///
    /// # Errors
    ///
    /// Returns an error if the write is rejected.
    fn delete(&self, entity_type: &EntityType, id: &str) -> StorageResult<()>;

    /// Returns every record of an entity type, tombstones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn list_all(&self, entity_type: &EntityType) -> StorageResult<Vec<Record>>;

    /// Atomically replaces every record of an entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if any record lacks an id (nothing is written) or the
    /// write is rejected.
    fn replace_all(&self, entity_type: &EntityType, records: Vec<Record>) -> StorageResult<()>;

    /// Returns the entity types currently holding records.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn entity_types(&self) -> StorageResult<Vec<EntityType>>;

    /// Wipes all local state. Irreversible.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    fn clear(&self) -> StorageResult<()>;
}
