//! # hoard storage
//!
//! Local entity store for hoard.
//!
//! The local store is the device's durable copy of every entity type. It is
//! synchronous and process-local: reads see the process's own writes
//! immediately, and nothing here touches the network.
//!
//! ## Design Principles
//!
//! - Records are keyed by `(entity type, id)`
//! - `put` is an unconditional upsert; tombstones are ordinary records
//! - `delete` is physical removal ("forget locally"), not a synced delete
//! - Medium failures are returned to the caller, never swallowed
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - For testing and ephemeral sessions
//! - [`FileStore`] - One JSON document per entity type on disk
//!
//! ## Example
//!
//! ```rust
//! use hoard_core::{EntityType, Record};
//! use hoard_storage::{InMemoryStore, LocalStore};
//! use serde_json::json;
//!
//! let store = InMemoryStore::new();
//! let monsters = EntityType::new("monsters").unwrap();
//! let goblin = Record::try_from(json!({"id": "g1", "lastModified": 1, "name": "Goblin"})).unwrap();
//!
//! store.put(&monsters, goblin.clone()).unwrap();
//! assert_eq!(store.get(&monsters, "g1").unwrap(), Some(goblin));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod file;
mod memory;
mod store;

pub use config::FileStoreConfig;
pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use store::LocalStore;
