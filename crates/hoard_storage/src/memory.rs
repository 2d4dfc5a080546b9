//! In-memory local store for testing.

use crate::error::{StorageError, StorageResult};
use crate::store::LocalStore;
use hoard_core::{Entity, EntityType, Record};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

type Namespace = BTreeMap<String, Record>;

/// An in-memory local store.
///
/// This store keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Sessions that don't need persistence
///
/// It can also simulate an unavailable medium (see
/// [`InMemoryStore::set_available`]) and a medium that rejects writes (see
/// [`InMemoryStore::set_read_only`]).
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use hoard_core::EntityType;
/// use hoard_storage::{InMemoryStore, LocalStore};
///
/// let store = InMemoryStore::new();
/// let parties = EntityType::new("parties").unwrap();
/// assert!(store.list_all(&parties).unwrap().is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryStore {
    data: RwLock<HashMap<EntityType, Namespace>>,
    available: AtomicBool,
    read_only: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            read_only: AtomicBool::new(false),
        }
    }

    /// Creates a store pre-populated with one entity type.
    ///
    /// # Errors
    ///
    /// Returns an error if any record lacks an id.
    pub fn with_records(entity_type: &EntityType, records: Vec<Record>) -> StorageResult<Self> {
        let store = Self::new();
        store.replace_all(entity_type, records)?;
        Ok(store)
    }

    /// Simulates the medium becoming unavailable (every call fails).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Simulates a medium that rejects writes (reads still succeed).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn check_readable(&self) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable("in-memory store disabled".into()))
        }
    }

    fn check_writable(&self) -> StorageResult<()> {
        self.check_readable()?;
        if self.read_only.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("write rejected: quota exceeded".into()))
        } else {
            Ok(())
        }
    }
}

/// Indexes records by key, rejecting the batch if any record is unkeyed.
pub(crate) fn index_records(
    entity_type: &EntityType,
    records: Vec<Record>,
) -> StorageResult<Namespace> {
    let mut namespace = Namespace::new();
    for record in records {
        let key = record
            .key()
            .ok_or_else(|| StorageError::missing_key(entity_type))?
            .into_owned();
        namespace.insert(key, record);
    }
    Ok(namespace)
}

impl LocalStore for InMemoryStore {
    fn get(&self, entity_type: &EntityType, id: &str) -> StorageResult<Option<Record>> {
        self.check_readable()?;
        Ok(self
            .data
            .read()
            .get(entity_type)
            .and_then(|ns| ns.get(id))
            .cloned())
    }

    fn put(&self, entity_type: &EntityType, record: Record) -> StorageResult<()> {
        self.check_writable()?;
        let key = record
            .key()
            .ok_or_else(|| StorageError::missing_key(entity_type))?
            .into_owned();
        self.data
            .write()
            .entry(entity_type.clone())
            .or_default()
            .insert(key, record);
        Ok(())
    }

    fn delete(&self, entity_type: &EntityType, id: &str) -> StorageResult<()> {
        self.check_writable()?;
        let mut data = self.data.write();
        if let Some(ns) = data.get_mut(entity_type) {
            ns.remove(id);
            if ns.is_empty() {
                data.remove(entity_type);
            }
        }
        Ok(())
    }

    fn list_all(&self, entity_type: &EntityType) -> StorageResult<Vec<Record>> {
        self.check_readable()?;
        Ok(self
            .data
            .read()
            .get(entity_type)
            .map(|ns| ns.values().cloned().collect())
            .unwrap_or_default())
    }

    fn replace_all(&self, entity_type: &EntityType, records: Vec<Record>) -> StorageResult<()> {
        self.check_writable()?;
        let namespace = index_records(entity_type, records)?;
        let mut data = self.data.write();
        if namespace.is_empty() {
            data.remove(entity_type);
        } else {
            data.insert(entity_type.clone(), namespace);
        }
        Ok(())
    }

    fn entity_types(&self) -> StorageResult<Vec<EntityType>> {
        self.check_readable()?;
        let mut types: Vec<EntityType> = self.data.read().keys().cloned().collect();
        types.sort();
        Ok(types)
    }

    fn clear(&self) -> StorageResult<()> {
        self.check_writable()?;
        self.data.write().clear();
        Ok(())
    }
}
