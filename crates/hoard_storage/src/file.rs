//! File-backed local store.
//!
//! Directory layout:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK               # Advisory lock for single-process ownership
//! ├─ monsters.json      # One document per entity type
//! └─ parties.json
//! ```
//!
//! Each namespace document is rewritten whole through a temporary file and
//! a rename, so a crash mid-write leaves the previous document intact.

use crate::config::FileStoreConfig;
use crate::error::{StorageError, StorageResult};
use crate::memory::index_records;
use crate::store::LocalStore;
use fs2::FileExt;
use hoard_core::{Entity, EntityType, Record};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "LOCK";
const NAMESPACE_EXT: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";
const USERS_DIR: &str = "users";
const FORMAT_VERSION: u32 = 1;

type Namespace = BTreeMap<String, Record>;

/// On-disk document for one entity type.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceFile {
    format_version: u32,
    entity_type: EntityType,
    records: Vec<Record>,
}

/// A file-backed local store.
///
/// Records survive process restarts. Namespaces are loaded lazily and cached;
/// every write goes to disk before the cache is updated, so a failed write
/// leaves both the file and the cache unchanged.
///
/// # Thread Safety
///
/// The store holds an exclusive lock on its directory for its whole lifetime.
/// Only one `FileStore` per directory can exist at a time, across processes.
///
/// # Example
///
/// ```no_run
/// use hoard_core::EntityType;
/// use hoard_storage::{FileStore, FileStoreConfig, LocalStore};
/// use std::path::Path;
///
/// let store = FileStore::open_for_user(Path::new("data"), "alice", FileStoreConfig::default()).unwrap();
/// let monsters = EntityType::new("monsters").unwrap();
/// println!("{} monsters", store.list_all(&monsters).unwrap().len());
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    config: FileStoreConfig,
    cache: RwLock<HashMap<EntityType, Namespace>>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, config: FileStoreConfig) -> StorageResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StorageError::Unavailable(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StorageError::InvalidPath(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        debug!(path = %path.display(), "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            config,
            cache: RwLock::new(HashMap::new()),
            _lock_file: lock_file,
        })
    }

    /// Opens the store owned by `user_id` under `base` (`<base>/users/<user_id>`).
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidPath`] if `user_id` is not a plain file
    /// name, plus everything [`FileStore::open`] returns.
    pub fn open_for_user(base: &Path, user_id: &str, config: FileStoreConfig) -> StorageResult<Self> {
        let usable = !user_id.is_empty()
            && user_id != "."
            && user_id != ".."
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@'));
        if !usable {
            return Err(StorageError::InvalidPath(format!("user id {user_id:?}")));
        }
        Self::open(&base.join(USERS_DIR).join(user_id), config)
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn namespace_path(&self, entity_type: &EntityType) -> PathBuf {
        self.path
            .join(format!("{}.{}", entity_type.as_str(), NAMESPACE_EXT))
    }

    fn read_namespace(&self, entity_type: &EntityType) -> StorageResult<Namespace> {
        let path = self.namespace_path(entity_type);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Namespace::new()),
            Err(e) => return Err(e.into()),
        };

        let file: NamespaceFile = serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Corrupted(format!("{}: {}", path.display(), e))
        })?;

        if file.format_version != FORMAT_VERSION {
            return Err(StorageError::Corrupted(format!(
                "{}: unsupported format version {}",
                path.display(),
                file.format_version
            )));
        }
        if &file.entity_type != entity_type {
            return Err(StorageError::Corrupted(format!(
                "{}: holds entity type {}",
                path.display(),
                file.entity_type
            )));
        }

        let count = file.records.len();
        let namespace = index_records(entity_type, file.records)
            .map_err(|e| StorageError::Corrupted(format!("{}: {}", path.display(), e)))?;
        debug!(%entity_type, records = count, "loaded namespace");
        Ok(namespace)
    }

    fn write_namespace(&self, entity_type: &EntityType, namespace: &Namespace) -> StorageResult<()> {
        let path = self.namespace_path(entity_type);

        if namespace.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        let document = NamespaceFile {
            format_version: FORMAT_VERSION,
            entity_type: entity_type.clone(),
            records: namespace.values().cloned().collect(),
        };
        let bytes = if self.config.pretty {
            serde_json::to_vec_pretty(&document)?
        } else {
            serde_json::to_vec(&document)?
        };

        let mut temp_name = path.clone().into_os_string();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);
        {
            let mut temp = File::create(&temp_path)?;
            temp.write_all(&bytes)?;
            temp.flush()?;
            if self.config.sync_on_write {
                temp.sync_all()?;
            }
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                warn!(path = %temp_path.display(), error = %cleanup, "failed to remove temp file");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Runs `f` against a namespace, using the cache when warm.
    ///
    /// A cold namespace is loaded under the write lock, so a load never
    /// publishes a document older than a concurrent update.
    fn with_namespace<T>(
        &self,
        entity_type: &EntityType,
        f: impl FnOnce(&Namespace) -> T,
    ) -> StorageResult<T> {
        if let Some(ns) = self.cache.read().get(entity_type) {
            return Ok(f(ns));
        }
        let mut cache = self.cache.write();
        let ns = match cache.entry(entity_type.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(self.read_namespace(entity_type)?),
        };
        Ok(f(ns))
    }

    /// Applies `f` to a copy of a namespace, persists it, then publishes it.
    fn update_namespace(
        &self,
        entity_type: &EntityType,
        f: impl FnOnce(&mut Namespace) -> StorageResult<()>,
    ) -> StorageResult<()> {
        let mut cache = self.cache.write();
        let mut ns = match cache.get(entity_type) {
            Some(ns) => ns.clone(),
            None => self.read_namespace(entity_type)?,
        };
        f(&mut ns)?;
        self.write_namespace(entity_type, &ns)?;
        cache.insert(entity_type.clone(), ns);
        Ok(())
    }
}

impl LocalStore for FileStore {
    fn get(&self, entity_type: &EntityType, id: &str) -> StorageResult<Option<Record>> {
        self.with_namespace(entity_type, |ns| ns.get(id).cloned())
    }

    fn put(&self, entity_type: &EntityType, record: Record) -> StorageResult<()> {
        let key = record
            .key()
            .ok_or_else(|| StorageError::missing_key(entity_type))?
            .into_owned();
        self.update_namespace(entity_type, |ns| {
            ns.insert(key, record);
            Ok(())
        })
    }

    fn delete(&self, entity_type: &EntityType, id: &str) -> StorageResult<()> {
        self.update_namespace(entity_type, |ns| {
            ns.remove(id);
            Ok(())
        })
    }

    fn list_all(&self, entity_type: &EntityType) -> StorageResult<Vec<Record>> {
        self.with_namespace(entity_type, |ns| ns.values().cloned().collect())
    }

    fn replace_all(&self, entity_type: &EntityType, records: Vec<Record>) -> StorageResult<()> {
        let replacement = index_records(entity_type, records)?;
        self.update_namespace(entity_type, |ns| {
            *ns = replacement;
            Ok(())
        })
    }

    fn entity_types(&self) -> StorageResult<Vec<EntityType>> {
        let mut types = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(NAMESPACE_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match EntityType::new(stem) {
                Ok(ty) => types.push(ty),
                Err(_) => warn!(path = %path.display(), "ignoring unrecognized file"),
            }
        }
        types.sort();
        Ok(types)
    }

    fn clear(&self) -> StorageResult<()> {
        let mut cache = self.cache.write();
        let types = match self.entity_types() {
            Ok(types) => types,
            Err(e) => {
                cache.clear();
                return Err(e);
            }
        };
        for entity_type in types {
            let path = self.namespace_path(&entity_type);
            let removed = match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                // Files already removed must not be served from the cache.
                cache.clear();
                return Err(e.into());
            }
        }
        cache.clear();
        debug!(path = %self.path.display(), "cleared file store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn monsters() -> EntityType {
        EntityType::new("monsters").unwrap()
    }

    fn record(id: &str, lm: u64, name: &str) -> Record {
        Record::try_from(json!({"id": id, "lastModified": lm, "name": name})).unwrap()
    }

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store");

        let store = FileStore::open(&path, FileStoreConfig::default()).unwrap();
        assert!(path.join(LOCK_FILE).exists());
        assert!(store.entity_types().unwrap().is_empty());
    }

    #[test]
    fn file_missing_dir_without_create_fails() {
        let dir = tempdir().unwrap();
        let config = FileStoreConfig::default().create_if_missing(false);
        let result = FileStore::open(&dir.path().join("absent"), config);
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn file_put_get_list() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();

        store.put(&monsters(), record("a", 1, "Goblin")).unwrap();
        store.put(&monsters(), record("b", 2, "Orc")).unwrap();

        assert_eq!(
            store.get(&monsters(), "a").unwrap(),
            Some(record("a", 1, "Goblin"))
        );
        assert_eq!(store.list_all(&monsters()).unwrap().len(), 2);
        assert_eq!(store.entity_types().unwrap(), vec![monsters()]);
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            store.put(&monsters(), record("a", 1, "Goblin")).unwrap();
            let mut ghoul = record("b", 2, "Ghoul");
            ghoul.tombstone(&hoard_core::ManualClock::new(3));
            store.put(&monsters(), ghoul).unwrap();
        }

        {
            let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            assert_eq!(store.list_all(&monsters()).unwrap().len(), 2);
            assert_eq!(
                store.get(&monsters(), "a").unwrap(),
                Some(record("a", 1, "Goblin"))
            );
            assert!(store.get(&monsters(), "b").unwrap().unwrap().is_deleted());
        }
    }

    #[test]
    fn file_lock_is_exclusive() {
        let dir = tempdir().unwrap();
        let _store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        let second = FileStore::open(dir.path(), FileStoreConfig::default());
        assert!(matches!(second, Err(StorageError::Locked)));
    }

    #[test]
    fn file_delete_removes_empty_namespace() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        store.put(&monsters(), record("a", 1, "Goblin")).unwrap();
        store.delete(&monsters(), "a").unwrap();

        assert!(!dir.path().join("monsters.json").exists());
        assert!(store.entity_types().unwrap().is_empty());
    }

    #[test]
    fn file_replace_all_rejects_unkeyed_without_writing() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        store.put(&monsters(), record("a", 1, "Goblin")).unwrap();
        let before = fs::read(dir.path().join("monsters.json")).unwrap();

        let unkeyed = Record::try_from(json!({"name": "?"})).unwrap();
        let result = store.replace_all(&monsters(), vec![record("b", 1, "Orc"), unkeyed]);
        assert!(matches!(result, Err(StorageError::MissingKey { .. })));

        assert_eq!(fs::read(dir.path().join("monsters.json")).unwrap(), before);
        assert_eq!(store.list_all(&monsters()).unwrap().len(), 1);
    }

    #[test]
    fn file_corruption_is_reported() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("monsters.json"), b"{not json").unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();

        let result = store.list_all(&monsters());
        assert!(matches!(result, Err(StorageError::Corrupted(_))));
    }

    #[test]
    fn file_records_round_trip_without_field_loss() {
        let dir = tempdir().unwrap();
        let original = Record::try_from(json!({
            "id": "a",
            "lastModified": 12,
            "deleted": true,
            "stats": {"hp": 30, "ac": 13},
            "conditions": ["prone", "grappled"],
            "notes": null,
        }))
        .unwrap();

        {
            let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            store.put(&monsters(), original.clone()).unwrap();
        }
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        assert_eq!(store.get(&monsters(), "a").unwrap(), Some(original));
    }

    #[test]
    fn file_clear() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        let parties = EntityType::new("parties").unwrap();
        store.put(&monsters(), record("a", 1, "Goblin")).unwrap();
        store.put(&parties, record("p", 1, "Heroes")).unwrap();

        store.clear().unwrap();
        assert!(store.entity_types().unwrap().is_empty());
        assert!(store.list_all(&monsters()).unwrap().is_empty());
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn file_failed_clear_drops_cached_namespaces() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
        store.put(&monsters(), record("a", 1, "Goblin")).unwrap();
        // Sorts after "monsters" and cannot be removed as a file.
        fs::create_dir(dir.path().join("zombies.json")).unwrap();
        fs::write(dir.path().join("zombies.json").join("keep"), b"x").unwrap();

        assert!(store.clear().is_err());
        assert!(!dir.path().join("monsters.json").exists());
        assert!(store.list_all(&monsters()).unwrap().is_empty());
    }

    #[test]
    fn file_cold_read_does_not_clobber_concurrent_put() {
        use std::sync::Barrier;
        use std::thread;

        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            let seed = (0..2000).map(|i| record(&format!("m{i}"), 1, "Kobold")).collect();
            store.replace_all(&monsters(), seed).unwrap();
        }

        for _ in 0..25 {
            let store = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            let barrier = Barrier::new(2);
            thread::scope(|scope| {
                scope.spawn(|| {
                    barrier.wait();
                    store.list_all(&monsters()).unwrap();
                });
                scope.spawn(|| {
                    barrier.wait();
                    store.put(&monsters(), record("b", 2, "Bugbear")).unwrap();
                });
            });
            store.put(&monsters(), record("c", 3, "Cultist")).unwrap();
            assert_eq!(
                store.get(&monsters(), "b").unwrap(),
                Some(record("b", 2, "Bugbear"))
            );
            drop(store);

            let reopened = FileStore::open(dir.path(), FileStoreConfig::default()).unwrap();
            assert!(reopened.get(&monsters(), "b").unwrap().is_some());
            reopened.delete(&monsters(), "b").unwrap();
            reopened.delete(&monsters(), "c").unwrap();
        }
    }

    #[test]
    fn file_open_for_user() {
        let dir = tempdir().unwrap();
        let store =
            FileStore::open_for_user(dir.path(), "alice@example.com", FileStoreConfig::default())
                .unwrap();
        assert_eq!(store.path(), dir.path().join("users").join("alice@example.com"));

        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                FileStore::open_for_user(dir.path(), bad, FileStoreConfig::default()),
                Err(StorageError::InvalidPath(_))
            ));
        }
    }
}
