//! Remote gateway abstraction.
//!
//! The gateway is the only I/O boundary of a sync attempt besides the local
//! store. It fetches the remote snapshot of one entity type and accepts
//! single-record writes.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use hoard_core::{Entity, EntityType, Record};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Remote acknowledgement of a pushed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAck {
    /// Id of the stored record.
    pub id: String,
    /// Version the remote now holds.
    pub last_modified: u64,
}

impl PushAck {
    /// Builds the acknowledgement for a record the remote accepted as-is.
    pub fn for_record(record: &Record) -> SyncResult<Self> {
        let id = record
            .key()
            .ok_or_else(|| SyncError::Rejected("record has no id".into()))?;
        Ok(Self {
            id: id.into_owned(),
            last_modified: record.last_modified(),
        })
    }
}

/// Access to the remote replica.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetches every record of `entity_type` owned by `user_id`.
    async fn fetch_all(&self, entity_type: &EntityType, user_id: &str) -> SyncResult<Vec<Record>>;

    /// Creates or overwrites one record on the remote.
    async fn push_one(&self, entity_type: &EntityType, record: &Record) -> SyncResult<PushAck>;
}

#[async_trait]
impl<G: RemoteGateway + ?Sized> RemoteGateway for Arc<G> {
    async fn fetch_all(&self, entity_type: &EntityType, user_id: &str) -> SyncResult<Vec<Record>> {
        (**self).fetch_all(entity_type, user_id).await
    }

    async fn push_one(&self, entity_type: &EntityType, record: &Record) -> SyncResult<PushAck> {
        (**self).push_one(entity_type, record).await
    }
}

type Collection = BTreeMap<String, Record>;

/// An in-process remote replica.
///
/// Holds one collection per (user, entity type) and behaves like a remote
/// service bound to a signed-in user. Failures can be injected to exercise
/// the sync state machine:
///
/// - [`set_online`](Self::set_online) toggles retryable network failures
/// - [`sign_out`](Self::sign_out) makes every call an auth failure
/// - [`fail_next_fetches`](Self::fail_next_fetches) and
///   [`fail_next_pushes`](Self::fail_next_pushes) fail a fixed number of calls
/// - [`set_latency`](Self::set_latency) delays every call
///
/// Share it between several services (devices) behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    data: Mutex<HashMap<String, HashMap<EntityType, Collection>>>,
    session: Mutex<Option<String>>,
    offline: AtomicBool,
    latency: Mutex<Duration>,
    failing_fetches: AtomicUsize,
    failing_pushes: AtomicUsize,
    fetches: AtomicUsize,
    pushes: AtomicUsize,
}

impl InMemoryRemote {
    /// Creates an empty remote with a signed-in user.
    pub fn new(user_id: impl Into<String>) -> Self {
        let remote = Self::default();
        remote.sign_in(user_id);
        remote
    }

    /// Signs a user in.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.session.lock() = Some(user_id.into());
    }

    /// Drops the session; calls fail with [`SyncError::AuthFailed`].
    pub fn sign_out(&self) {
        *self.session.lock() = None;
    }

    /// Simulates connectivity.
    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Fails the next `count` fetches with a retryable error.
    pub fn fail_next_fetches(&self, count: usize) {
        self.failing_fetches.store(count, Ordering::SeqCst);
    }

    /// Fails the next `count` pushes with a retryable error.
    pub fn fail_next_pushes(&self, count: usize) {
        self.failing_pushes.store(count, Ordering::SeqCst);
    }

    /// Writes a record directly, as another device would.
    pub fn insert(&self, user_id: &str, entity_type: &EntityType, record: Record) {
        if let Some(key) = record.key().map(|key| key.into_owned()) {
            self.data
                .lock()
                .entry(user_id.to_string())
                .or_default()
                .entry(entity_type.clone())
                .or_default()
                .insert(key, record);
        }
    }

    /// Returns the stored records of a user, ordered by id.
    pub fn records(&self, user_id: &str, entity_type: &EntityType) -> Vec<Record> {
        self.data
            .lock()
            .get(user_id)
            .and_then(|types| types.get(entity_type))
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of fetch calls received (including failed ones).
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of push calls received (including failed ones).
    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    async fn simulate_call(&self, failing: &AtomicUsize) -> SyncResult<String> {
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::network_retryable("remote unreachable"));
        }
        let user = self
            .session
            .lock()
            .clone()
            .ok_or_else(|| SyncError::AuthFailed("not signed in".into()))?;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SyncError::network_retryable("injected failure"));
        }
        Ok(user)
    }
}

#[async_trait]
impl RemoteGateway for InMemoryRemote {
    async fn fetch_all(&self, entity_type: &EntityType, user_id: &str) -> SyncResult<Vec<Record>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let user = self.simulate_call(&self.failing_fetches).await?;
        if user != user_id {
            return Err(SyncError::AuthFailed(format!(
                "session does not belong to {user_id}"
            )));
        }
        Ok(self.records(user_id, entity_type))
    }

    async fn push_one(&self, entity_type: &EntityType, record: &Record) -> SyncResult<PushAck> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        let user = self.simulate_call(&self.failing_pushes).await?;
        let ack = PushAck::for_record(record)?;
        self.insert(&user, entity_type, record.clone());
        Ok(ack)
    }
}
