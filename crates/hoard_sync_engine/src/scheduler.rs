//! Trigger scheduling.
//!
//! The scheduler is the single place where sync triggers originate: the
//! interval timer, visibility changes and manual requests reported by the
//! application, and delayed retries after failures. Every trigger goes
//! through [`SyncService::trigger`], so coalescing and backoff apply no
//! matter where it came from.

use crate::gateway::RemoteGateway;
use crate::service::{SyncService, TriggerOutcome};
use crate::state::TriggerSource;
use hoard_core::EntityType;
use hoard_storage::LocalStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

enum Command {
    Trigger {
        entity_type: Option<EntityType>,
        source: TriggerSource,
    },
    Shutdown,
}

/// Drives a [`SyncService`] for a fixed set of entity types.
pub struct SyncScheduler<G, S: ?Sized> {
    service: Arc<SyncService<G, S>>,
    entity_types: Vec<EntityType>,
}

impl<G, S> SyncScheduler<G, S>
where
    G: RemoteGateway + 'static,
    S: LocalStore + ?Sized + 'static,
{
    /// Creates a scheduler for `entity_types`.
    pub fn new(service: Arc<SyncService<G, S>>, entity_types: Vec<EntityType>) -> Self {
        Self {
            service,
            entity_types,
        }
    }

    /// Spawns the scheduling loop on the current tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(self.service, self.entity_types, rx));
        SchedulerHandle { commands, task }
    }
}

/// Handle to a running scheduler.
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Reports that the application became visible again.
    pub fn visibility_regained(&self) {
        self.send(Command::Trigger {
            entity_type: None,
            source: TriggerSource::Visibility,
        });
    }

    /// Requests a manual sync of every registered entity type.
    pub fn sync_all(&self) {
        self.send(Command::Trigger {
            entity_type: None,
            source: TriggerSource::Manual,
        });
    }

    /// Requests a manual sync of one entity type.
    pub fn sync_now(&self, entity_type: EntityType) {
        self.send(Command::Trigger {
            entity_type: Some(entity_type),
            source: TriggerSource::Manual,
        });
    }

    /// Returns true while the scheduling loop runs.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops scheduling and waits for in-flight attempts to finish.
    ///
    /// Pending retries are dropped. Attempts already running are not
    /// cancelled and still commit.
    pub async fn shutdown(self) {
        self.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "sync scheduler task ended abnormally");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("sync scheduler already stopped, trigger dropped");
        }
    }
}

async fn run<G, S>(
    service: Arc<SyncService<G, S>>,
    entity_types: Vec<EntityType>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    G: RemoteGateway + 'static,
    S: LocalStore + ?Sized + 'static,
{
    let mut attempts: JoinSet<TriggerOutcome> = JoinSet::new();
    let mut retries: JoinSet<EntityType> = JoinSet::new();
    let mut ticker = service.config().sync_interval.map(|period| {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    info!(types = entity_types.len(), "sync scheduler started");

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Trigger { entity_type, source }) => {
                    let targets = match entity_type {
                        Some(entity_type) => vec![entity_type],
                        None => entity_types.clone(),
                    };
                    for entity_type in targets {
                        spawn_attempt(&mut attempts, &service, entity_type, source);
                    }
                }
                Some(Command::Shutdown) | None => break,
            },
            () = next_tick(&mut ticker) => {
                for entity_type in &entity_types {
                    spawn_attempt(&mut attempts, &service, entity_type.clone(), TriggerSource::Timer);
                }
            }
            Some(joined) = attempts.join_next(), if !attempts.is_empty() => match joined {
                Ok(TriggerOutcome::Ran(session)) => {
                    if let Some(delay) = session.retry_in {
                        debug!(entity_type = %session.entity_type, ?delay, "retry scheduled");
                        schedule_retry(&mut retries, session.entity_type, delay);
                    }
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "sync attempt task failed"),
            },
            Some(joined) = retries.join_next(), if !retries.is_empty() => {
                if let Ok(entity_type) = joined {
                    spawn_attempt(&mut attempts, &service, entity_type, TriggerSource::Retry);
                }
            }
        }
    }

    retries.abort_all();
    while let Some(joined) = attempts.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "sync attempt task failed during shutdown");
        }
    }
    info!("sync scheduler stopped");
}

fn spawn_attempt<G, S>(
    attempts: &mut JoinSet<TriggerOutcome>,
    service: &Arc<SyncService<G, S>>,
    entity_type: EntityType,
    source: TriggerSource,
) where
    G: RemoteGateway + 'static,
    S: LocalStore + ?Sized + 'static,
{
    let service = Arc::clone(service);
    attempts.spawn(async move { service.trigger(&entity_type, source).await });
}

fn schedule_retry(retries: &mut JoinSet<EntityType>, entity_type: EntityType, delay: Duration) {
    retries.spawn(async move {
        time::sleep(delay).await;
        entity_type
    });
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
