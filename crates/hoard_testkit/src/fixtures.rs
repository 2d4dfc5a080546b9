//! Test fixtures and store helpers.
//!
//! Provides convenience functions for setting up local stores and common
//! reconciliation scenarios.

use hoard_core::{EntityType, Record};
use hoard_storage::{FileStore, FileStoreConfig, InMemoryStore, LocalStore};
use serde_json::{Map, Value};
use std::path::Path;
use tempfile::TempDir;

/// Builds a record from an id, a timestamp and a display name.
pub fn record(id: &str, last_modified: u64, name: &str) -> Record {
    let mut map = Map::new();
    map.insert("id".into(), Value::from(id));
    map.insert("lastModified".into(), Value::from(last_modified));
    map.insert("name".into(), Value::from(name));
    Record::from_map(map)
}

/// Builds a tombstone.
pub fn tombstone(id: &str, last_modified: u64) -> Record {
    let mut map = Map::new();
    map.insert("id".into(), Value::from(id));
    map.insert("lastModified".into(), Value::from(last_modified));
    map.insert("deleted".into(), Value::Bool(true));
    Record::from_map(map)
}

/// Returns a validated entity type, panicking on invalid names.
pub fn entity_type(name: &str) -> EntityType {
    EntityType::new(name).expect("Invalid entity type in test")
}

/// A file store in a temporary directory with automatic cleanup.
pub struct TestFileStore {
    /// The store instance.
    pub store: FileStore,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: TempDir,
}

impl TestFileStore {
    /// Creates a new empty file store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = FileStore::open(temp_dir.path(), FileStoreConfig::default())
            .expect("Failed to open file store");
        Self { store, temp_dir }
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the raw bytes of a namespace file, if it exists.
    pub fn namespace_bytes(&self, entity_type: &EntityType) -> Option<Vec<u8>> {
        std::fs::read(self.path().join(format!("{entity_type}.json"))).ok()
    }
}

impl Default for TestFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestFileStore {
    type Target = FileStore;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// Runs a test with a temporary file store.
pub fn with_file_store<F, R>(f: F) -> R
where
    F: FnOnce(&FileStore, &Path) -> R,
{
    let test_store = TestFileStore::new();
    f(&test_store.store, test_store.path())
}

/// Canonical reconciliation scenarios.
pub mod scenarios {
    use super::*;

    /// Local holds a stale "Goblin"; the remote renamed it and added an "Orc".
    pub fn goblin_king() -> (Vec<Record>, Vec<Record>) {
        let local = vec![record("g1", 5, "Goblin")];
        let remote = vec![record("g1", 9, "Goblin King"), record("o1", 3, "Orc")];
        (local, remote)
    }

    /// The remote holds a tombstone for an entity the local never saw.
    pub fn remote_only_tombstone() -> (Vec<Record>, Vec<Record>) {
        (Vec::new(), vec![tombstone("x", 4)])
    }

    /// Creates an in-memory store holding `count` records of one type.
    pub fn populated_store(entity_type: &EntityType, count: usize) -> InMemoryStore {
        let store = InMemoryStore::new();
        for i in 0..count {
            store
                .put(entity_type, record(&format!("e{i}"), i as u64 + 1, "seed"))
                .expect("Failed to put record");
        }
        store
    }
}
