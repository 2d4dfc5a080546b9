//! Sync service.
//!
//! One attempt for an entity type runs in a fixed order:
//!
//! 1. fetch the remote snapshot (bounded by the configured timeout)
//! 2. read the local snapshot
//! 3. reconcile the two
//! 4. commit the merged result to the local store in one `replace_all`
//! 5. push every merged record the remote has not acknowledged yet
//!
//! A failure in steps 1-4 leaves the local store untouched. A failure while
//! pushing keeps the commit; the unpushed records are picked up again on the
//! next attempt because the remote still holds an older version of them.

use crate::config::SyncConfig;
use crate::error::{FailureKind, SyncError, SyncResult};
use crate::feed::{SyncEvent, SyncFeed};
use crate::gateway::RemoteGateway;
use crate::ledger::AckLedger;
use crate::state::{Admission, DeferReason, SyncState, SyncStats, TriggerSource, TypeMachine};
use hoard_core::{reconcile_with_report, Entity, EntityType, Record};
use std::borrow::Cow;
use hoard_storage::LocalStore;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// How a sync attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Fetched, committed and pushed everything.
    Success,
    /// Committed, but some records could not be pushed.
    Partial {
        /// Failure category of the push error.
        kind: FailureKind,
        /// Human-readable reason.
        reason: String,
    },
    /// Nothing was committed.
    Failure {
        /// Failure category.
        kind: FailureKind,
        /// Human-readable reason.
        reason: String,
    },
}

impl SessionOutcome {
    /// Returns the failure category, if the attempt did not fully succeed.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            SessionOutcome::Success => None,
            SessionOutcome::Partial { kind, .. } | SessionOutcome::Failure { kind, .. } => {
                Some(*kind)
            }
        }
    }
}

/// Record of one sync attempt. Not persisted.
#[derive(Debug, Clone)]
pub struct SyncSession {
    /// The entity type that was synced.
    pub entity_type: EntityType,
    /// What started the attempt.
    pub source: TriggerSource,
    /// How the attempt ended.
    pub outcome: SessionOutcome,
    /// Records fetched from the remote.
    pub pulled: usize,
    /// Records pushed to the remote.
    pub pushed: usize,
    /// Local entities added, replaced or removed by the commit.
    pub changed: usize,
    /// Delay before an automatic retry, if one should be scheduled.
    pub retry_in: Option<Duration>,
    /// Wall time of the attempt.
    pub duration: Duration,
}

impl SyncSession {
    fn new(entity_type: EntityType, source: TriggerSource) -> Self {
        Self {
            entity_type,
            source,
            outcome: SessionOutcome::Success,
            pulled: 0,
            pushed: 0,
            changed: 0,
            retry_in: None,
            duration: Duration::ZERO,
        }
    }

    /// Returns true if the attempt settled.
    pub fn is_success(&self) -> bool {
        self.outcome == SessionOutcome::Success
    }
}

/// Result of [`SyncService::trigger`].
#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    /// An attempt ran to completion.
    Ran(SyncSession),
    /// An attempt for the same entity type was already in flight.
    Coalesced,
    /// The trigger was refused.
    Deferred(DeferReason),
    /// The attempt task was torn down before reporting, which only happens
    /// while the runtime shuts down.
    Abandoned,
}

impl TriggerOutcome {
    /// Returns the session if an attempt ran.
    pub fn session(&self) -> Option<&SyncSession> {
        match self {
            TriggerOutcome::Ran(session) => Some(session),
            _ => None,
        }
    }

    /// Returns true if an attempt ran and settled.
    pub fn is_settled(&self) -> bool {
        self.session().is_some_and(SyncSession::is_success)
    }
}

/// Outcome of steps 1-4.
struct Commit {
    pulled: usize,
    changed: usize,
    ledger: AckLedger,
    pending: Vec<Record>,
}

type Machines = Mutex<HashMap<EntityType, TypeMachine>>;

/// Resets an entity type to `Idle` if its attempt task unwinds or is torn
/// down by the runtime.
struct AttemptGuard<'a> {
    machines: &'a Machines,
    entity_type: &'a EntityType,
    armed: bool,
}

impl AttemptGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Some(machine) = self.machines.lock().get_mut(self.entity_type) {
                machine.abandon();
            }
        }
    }
}

/// State shared between the service handle and its attempt tasks.
struct Shared<G, S: ?Sized> {
    config: SyncConfig,
    gateway: G,
    store: Arc<S>,
    machines: Machines,
    stats: RwLock<SyncStats>,
    feed: SyncFeed,
}

/// Reconciles local entity types with a remote gateway.
///
/// The service owns a state machine per entity type. Attempts for the same
/// type never overlap; different types are independent and may run
/// concurrently from different tasks.
///
/// Every admitted attempt runs on its own tokio task. Dropping the future
/// returned by [`trigger`](Self::trigger) stops waiting for the result but
/// never cancels the attempt: it still commits, pushes and reports.
pub struct SyncService<G, S: ?Sized> {
    shared: Arc<Shared<G, S>>,
}

impl<G, S> SyncService<G, S>
where
    G: RemoteGateway + 'static,
    S: LocalStore + ?Sized + 'static,
{
    /// Creates a new sync service.
    pub fn new(config: SyncConfig, gateway: G, store: Arc<S>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                gateway,
                store,
                machines: Mutex::new(HashMap::new()),
                stats: RwLock::new(SyncStats::default()),
                feed: SyncFeed::new(),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &G {
        &self.shared.gateway
    }

    /// Returns the local store.
    pub fn store(&self) -> &Arc<S> {
        &self.shared.store
    }

    /// Gets the state of an entity type.
    pub fn state(&self, entity_type: &EntityType) -> SyncState {
        self.shared
            .machines
            .lock()
            .get(entity_type)
            .map(TypeMachine::state)
            .unwrap_or_default()
    }

    /// Number of consecutive failed attempts for an entity type.
    pub fn consecutive_failures(&self, entity_type: &EntityType) -> u32 {
        self.shared
            .machines
            .lock()
            .get(entity_type)
            .map(TypeMachine::consecutive_failures)
            .unwrap_or(0)
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    /// Subscribes to sync events.
    pub fn subscribe(&self) -> Receiver<SyncEvent> {
        self.shared.feed.subscribe()
    }

    /// Clears auth blocks and backoff after the user signed in again.
    pub fn reauthenticated(&self) {
        for machine in self.shared.machines.lock().values_mut() {
            machine.reauthenticated();
        }
        info!("credentials refreshed, sync re-armed");
    }

    /// Runs a manual attempt.
    pub async fn sync_now(&self, entity_type: &EntityType) -> TriggerOutcome {
        self.trigger(entity_type, TriggerSource::Manual).await
    }

    /// Asks for a sync attempt.
    ///
    /// An admitted attempt is spawned and awaited. A trigger arriving while
    /// an attempt for the same type is in flight is coalesced; automatic
    /// triggers during backoff or after an auth failure are deferred.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the attempt task.
    pub async fn trigger(&self, entity_type: &EntityType, source: TriggerSource) -> TriggerOutcome {
        let admission = self
            .shared
            .machines
            .lock()
            .entry(entity_type.clone())
            .or_default()
            .admit(source, Instant::now());

        match admission {
            Admission::Start => {}
            Admission::Coalesced => {
                self.shared.stats.write().coalesced += 1;
                debug!(entity_type = %entity_type, %source, "sync already in flight, coalesced");
                return TriggerOutcome::Coalesced;
            }
            Admission::Deferred(reason) => {
                self.shared.stats.write().deferred += 1;
                debug!(entity_type = %entity_type, %source, ?reason, "sync deferred");
                return TriggerOutcome::Deferred(reason);
            }
        }

        let shared = Arc::clone(&self.shared);
        let owned = entity_type.clone();
        let task = tokio::spawn(async move { shared.attempt(owned, source).await });
        match task.await {
            Ok(session) => TriggerOutcome::Ran(session),
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                warn!(entity_type = %entity_type, error = %e, "sync attempt task abandoned");
                TriggerOutcome::Abandoned
            }
        }
    }
}

impl<G, S> Shared<G, S>
where
    G: RemoteGateway,
    S: LocalStore + ?Sized,
{
    /// Runs one admitted attempt to the end.
    async fn attempt(&self, entity_type: EntityType, source: TriggerSource) -> SyncSession {
        let guard = AttemptGuard {
            machines: &self.machines,
            entity_type: &entity_type,
            armed: true,
        };
        self.stats.write().attempts += 1;
        debug!(entity_type = %entity_type, %source, "sync attempt started");

        let started = Instant::now();
        let mut session = SyncSession::new(entity_type.clone(), source);
        let error = self.run_attempt(&mut session).await;
        session.duration = started.elapsed();

        self.finish(&mut session, error);
        guard.disarm();
        session
    }

    async fn run_attempt(&self, session: &mut SyncSession) -> Option<SyncError> {
        let entity_type = session.entity_type.clone();
        let commit = match self.pull_and_commit(&entity_type).await {
            Ok(commit) => commit,
            Err(e) => {
                session.outcome = SessionOutcome::Failure {
                    kind: e.kind(),
                    reason: e.to_string(),
                };
                return Some(e);
            }
        };
        session.pulled = commit.pulled;
        session.changed = commit.changed;

        let Commit {
            mut ledger,
            pending,
            ..
        } = commit;
        match self.push_pending(&entity_type, &pending, &mut ledger, &mut session.pushed).await {
            Ok(()) => None,
            Err(e) => {
                session.outcome = SessionOutcome::Partial {
                    kind: e.kind(),
                    reason: e.to_string(),
                };
                Some(e)
            }
        }
    }

    async fn pull_and_commit(&self, entity_type: &EntityType) -> SyncResult<Commit> {
        let remote = self
            .bounded(self.gateway.fetch_all(entity_type, &self.config.user_id))
            .await?;
        let local = self.store.list_all(entity_type)?;

        let pulled = remote.len();
        let ledger = AckLedger::from_snapshot(&remote);
        let local_ids: Vec<String> = local
            .iter()
            .filter_map(|r| r.key().map(|key| key.into_owned()))
            .collect();

        let report = reconcile_with_report(local, remote, self.config.merge_options);

        let merged_ids: HashSet<Cow<'_, str>> = report.merged.iter().filter_map(|r| r.key()).collect();
        let removed = local_ids
            .iter()
            .filter(|id| !merged_ids.contains(id.as_str()))
            .count();
        let changed = report.accepted_remote.len() + removed;

        if changed > 0 {
            self.store.replace_all(entity_type, report.merged.clone())?;
            debug!(entity_type = %entity_type, changed, "merged snapshot committed");
        }
        if report.unkeyed_dropped > 0 {
            warn!(
                entity_type = %entity_type,
                dropped = report.unkeyed_dropped,
                "dropped records without an id"
            );
        }

        let pending = ledger.pending(&report.merged).into_iter().cloned().collect();
        Ok(Commit {
            pulled,
            changed,
            ledger,
            pending,
        })
    }

    async fn push_pending(
        &self,
        entity_type: &EntityType,
        pending: &[Record],
        ledger: &mut AckLedger,
        pushed: &mut usize,
    ) -> SyncResult<()> {
        for batch in pending.chunks(self.config.push_batch_size.max(1)) {
            for record in batch {
                if !ledger.needs_push(record) {
                    continue;
                }
                let ack = self.bounded(self.gateway.push_one(entity_type, record)).await?;
                ledger.acknowledge(&ack.id, ack.last_modified);
                *pushed += 1;
            }
            debug!(entity_type = %entity_type, batch = batch.len(), "push batch done");
        }
        Ok(())
    }

    async fn bounded<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| SyncError::Timeout)?
    }

    /// Moves the machine out of `Syncing`, updates stats and emits the event.
    fn finish(&self, session: &mut SyncSession, error: Option<SyncError>) {
        let entity_type = session.entity_type.clone();
        let Some(error) = error else {
            if let Some(machine) = self.machines.lock().get_mut(&entity_type) {
                machine.settle();
            }
            {
                let mut stats = self.stats.write();
                stats.settled += 1;
                stats.entities_pulled += session.pulled as u64;
                stats.entities_pushed += session.pushed as u64;
                stats.last_sync_time = Some(Instant::now());
            }
            info!(
                entity_type = %entity_type,
                pulled = session.pulled,
                pushed = session.pushed,
                changed = session.changed,
                "sync settled"
            );
            self.feed.emit(SyncEvent::Settled {
                entity_type,
                changed: session.changed,
                pulled: session.pulled,
                pushed: session.pushed,
            });
            return;
        };

        let kind = error.kind();
        let retry = &self.config.retry;
        let (rearm, failures) = {
            let mut machines = self.machines.lock();
            let machine = machines.entry(entity_type.clone()).or_default();
            let rearm = machine.fail(kind, Instant::now(), |n| retry.delay_for_attempt(n));
            (rearm, machine.consecutive_failures())
        };
        session.retry_in = rearm.filter(|_| error.is_retryable() && failures < retry.max_attempts);

        {
            let mut stats = self.stats.write();
            stats.failed += 1;
            stats.entities_pulled += session.pulled as u64;
            stats.entities_pushed += session.pushed as u64;
            stats.last_error = Some(error.to_string());
        }
        warn!(
            entity_type = %entity_type,
            %kind,
            failures,
            error = %error,
            retry_in = ?session.retry_in,
            "sync failed"
        );
        self.feed.emit(SyncEvent::Failed {
            entity_type,
            kind,
            reason: error.to_string(),
            retry_in: session.retry_in,
        });
    }
}
