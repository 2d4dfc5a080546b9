//! # hoard core
//!
//! Entity model and merge engine for hoard.
//!
//! This crate provides:
//! - The [`Entity`] trait: the minimal view (`id`, `lastModified`, `deleted`)
//!   the merge engine needs from a record
//! - [`Record`], a flat attribute map, and [`Versioned`], a typed container
//! - [`EntityType`] namespaces
//! - Injectable [`IdGenerator`] and [`Clock`] sources
//! - The merge engine: [`reconcile`], [`deduplicate`], [`filter_deleted`]
//!
//! This is a pure crate with no I/O operations.
//!
//! ## Consistency model
//!
//! Whole-record Last-Write-Wins. Two versions of the same entity are compared
//! by `lastModified` only; the strictly newer one wins and the local version
//! wins ties. Tombstones (`deleted: true`) are ordinary mutations.
//!
//! ## Example
//!
//! ```rust
//! use hoard_core::{reconcile, MergeOptions, Record};
//! use serde_json::json;
//!
//! let local = vec![Record::try_from(json!({"id": "a", "lastModified": 5, "name": "Goblin"})).unwrap()];
//! let remote = vec![Record::try_from(json!({"id": "a", "lastModified": 9, "name": "Goblin King"})).unwrap()];
//!
//! let merged = reconcile(local, remote, MergeOptions::default());
//! assert_eq!(merged[0].get("name"), Some(&json!("Goblin King")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod entity;
mod error;
mod merge;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entity::{
    Entity, IdGenerator, Record, SequentialIdGenerator, UuidGenerator, Versioned, DELETED_FIELD,
    ID_FIELD, LAST_MODIFIED_FIELD, LEGACY_ID_FIELD,
};
pub use error::{CoreError, CoreResult};
pub use merge::{
    deduplicate, filter_deleted, reconcile, reconcile_with_report, MergeOptions, MergeReport,
};
pub use types::{EntityType, Replica};
