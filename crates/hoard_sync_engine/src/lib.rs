//! # Hoard Sync Engine
//!
//! Reconciles a local store with a remote replica.
//!
//! This crate provides:
//! - A per-entity-type state machine (idle → syncing → settled / failed)
//! - Trigger coalescing, exponential backoff, auth blocking
//! - The remote gateway trait, with HTTP and in-memory implementations
//! - An acknowledgement ledger so pulled records are never pushed back
//! - A tokio scheduler for timer, visibility, manual and retry triggers
//! - A feed of sync events for the application
//!
//! ## Ordering
//!
//! Within one attempt the remote snapshot is fetched before anything is
//! merged, and the merged result is committed locally before anything is
//! pushed. Attempts for the same entity type never overlap.
//!
//! ## Example
//!
//! ```rust
//! use hoard_core::EntityType;
//! use hoard_storage::InMemoryStore;
//! use hoard_sync_engine::{InMemoryRemote, SyncConfig, SyncService};
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let remote = InMemoryRemote::new("alice");
//! let store = Arc::new(InMemoryStore::new());
//! let service = SyncService::new(SyncConfig::new("alice"), remote, store);
//!
//! let monsters = EntityType::new("monsters").unwrap();
//! assert!(service.sync_now(&monsters).await.is_settled());
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod feed;
mod gateway;
mod http;
mod ledger;
mod scheduler;
mod service;
mod state;

pub use config::{RetryConfig, SyncConfig};
pub use error::{FailureKind, SyncError, SyncResult};
pub use feed::{SyncEvent, SyncFeed};
pub use gateway::{InMemoryRemote, PushAck, RemoteGateway};
pub use http::{HttpClient, HttpGateway, HttpRequest, HttpResponse, Method};
pub use ledger::AckLedger;
pub use scheduler::{SchedulerHandle, SyncScheduler};
pub use service::{SessionOutcome, SyncService, SyncSession, TriggerOutcome};
pub use state::{DeferReason, SyncState, SyncStats, TriggerSource};
