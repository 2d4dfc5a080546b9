//! Sync event feed.
//!
//! The feed tells the application that a sync attempt finished so it can
//! refresh views from the local store, or surface a failure.

use crate::error::FailureKind;
use hoard_core::EntityType;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

/// An event emitted when a sync attempt finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The attempt fetched, merged and committed.
    Settled {
        /// The entity type that was synced.
        entity_type: EntityType,
        /// Number of local entities that changed (added, replaced, removed).
        changed: usize,
        /// Number of records fetched from the remote.
        pulled: usize,
        /// Number of records pushed to the remote.
        pushed: usize,
    },
    /// The attempt failed.
    Failed {
        /// The entity type that was synced.
        entity_type: EntityType,
        /// Failure category.
        kind: FailureKind,
        /// Human-readable reason.
        reason: String,
        /// When the next automatic attempt is allowed, if any.
        retry_in: Option<Duration>,
    },
}

impl SyncEvent {
    /// Returns the entity type of the event.
    pub fn entity_type(&self) -> &EntityType {
        match self {
            SyncEvent::Settled { entity_type, .. } | SyncEvent::Failed { entity_type, .. } => {
                entity_type
            }
        }
    }

    /// Returns true if local data may have changed.
    pub fn is_data_changed(&self) -> bool {
        matches!(self, SyncEvent::Settled { changed, .. } if *changed > 0)
    }
}

/// Fan-out of sync events to subscribers.
///
/// Subscribers whose receiver was dropped are pruned on the next emit.
pub struct SyncFeed {
    subscribers: RwLock<Vec<Sender<SyncEvent>>>,
}

impl SyncFeed {
    /// Creates a new feed with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to sync events.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends an event to every live subscriber.
    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Returns the number of subscribers still registered.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for SyncFeed {
    fn default() -> Self {
        Self::new()
    }
}
