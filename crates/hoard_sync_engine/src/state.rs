//! Sync state machine.

use crate::error::FailureKind;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// The sync state of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    /// No attempt in flight and none has run yet.
    #[default]
    Idle,
    /// An attempt is in flight.
    Syncing,
    /// The last attempt committed and pushed everything.
    Settled,
    /// The last attempt failed.
    Failed,
}

impl SyncState {
    /// Returns true if an attempt is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }

    /// Returns true if a new attempt may start (ignoring backoff).
    pub fn can_start_sync(&self) -> bool {
        !self.is_active()
    }
}

/// What caused a sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerSource {
    /// The application became visible again.
    Visibility,
    /// The periodic timer elapsed.
    Timer,
    /// Explicit user action. Bypasses backoff and clears an auth block.
    Manual,
    /// Scheduled retry after a failure.
    Retry,
}

impl TriggerSource {
    /// Returns true for sources that are not direct user actions.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, TriggerSource::Manual)
    }
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TriggerSource::Visibility => "visibility",
            TriggerSource::Timer => "timer",
            TriggerSource::Manual => "manual",
            TriggerSource::Retry => "retry",
        };
        f.write_str(name)
    }
}

/// Why a trigger did not start an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// The previous attempt failed and the backoff delay has not elapsed.
    Backoff {
        /// Time left until automatic triggers are accepted again.
        remaining: Duration,
    },
    /// Credentials were rejected; waiting for re-authentication.
    AuthRequired,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Attempts started.
    pub attempts: u64,
    /// Attempts that settled.
    pub settled: u64,
    /// Attempts that failed (including partial pushes).
    pub failed: u64,
    /// Triggers ignored because an attempt was in flight.
    pub coalesced: u64,
    /// Triggers refused because of backoff or an auth block.
    pub deferred: u64,
    /// Records fetched from the remote.
    pub entities_pulled: u64,
    /// Records pushed to the remote.
    pub entities_pushed: u64,
    /// Completion time of the last settled attempt.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Result of asking the machine to start an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    Start,
    Coalesced,
    Deferred(DeferReason),
}

/// Per-entity-type machine.
#[derive(Debug, Default)]
pub(crate) struct TypeMachine {
    state: SyncState,
    consecutive_failures: u32,
    rearm_at: Option<Instant>,
    auth_blocked: bool,
}

impl TypeMachine {
    pub(crate) fn state(&self) -> SyncState {
        self.state
    }

    pub(crate) fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Moves to `Syncing` if `source` is allowed to start an attempt now.
    pub(crate) fn admit(&mut self, source: TriggerSource, now: Instant) -> Admission {
        if self.state.is_active() {
            return Admission::Coalesced;
        }

        if source.is_automatic() {
            if self.auth_blocked {
                return Admission::Deferred(DeferReason::AuthRequired);
            }
            if let Some(rearm_at) = self.rearm_at {
                if now < rearm_at {
                    return Admission::Deferred(DeferReason::Backoff {
                        remaining: rearm_at - now,
                    });
                }
            }
        } else {
            self.auth_blocked = false;
        }

        self.state = SyncState::Syncing;
        Admission::Start
    }

    pub(crate) fn settle(&mut self) {
        self.state = SyncState::Settled;
        self.consecutive_failures = 0;
        self.rearm_at = None;
        self.auth_blocked = false;
    }

    /// Records a failure. `backoff` maps the new failure count to a delay.
    ///
    /// Returns the delay before automatic triggers are accepted again, or
    /// `None` when only re-authentication or a manual trigger can resume.
    pub(crate) fn fail(
        &mut self,
        kind: FailureKind,
        now: Instant,
        backoff: impl FnOnce(u32) -> Duration,
    ) -> Option<Duration> {
        self.state = SyncState::Failed;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        if kind == FailureKind::Auth {
            self.auth_blocked = true;
            self.rearm_at = None;
            return None;
        }
        let delay = backoff(self.consecutive_failures);
        self.rearm_at = Some(now + delay);
        Some(delay)
    }

    /// Abandons an attempt that never reached an outcome.
    pub(crate) fn abandon(&mut self) {
        if self.state.is_active() {
            self.state = SyncState::Idle;
        }
    }

    pub(crate) fn reauthenticated(&mut self) {
        self.auth_blocked = false;
        self.rearm_at = None;
        self.consecutive_failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(delay_ms: u64) -> impl FnOnce(u32) -> Duration {
        move |_| Duration::from_millis(delay_ms)
    }

    #[test]
    fn sync_state_checks() {
        assert!(!SyncState::Idle.is_active());
        assert!(SyncState::Syncing.is_active());
        assert!(SyncState::Settled.can_start_sync());
        assert!(SyncState::Failed.can_start_sync());
        assert!(!SyncState::Syncing.can_start_sync());
    }

    #[test]
    fn trigger_while_syncing_is_coalesced() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        assert_eq!(machine.admit(TriggerSource::Timer, now), Admission::Start);
        assert_eq!(machine.state(), SyncState::Syncing);
        assert_eq!(machine.admit(TriggerSource::Manual, now), Admission::Coalesced);
    }

    #[test]
    fn settled_rearms_immediately() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        machine.admit(TriggerSource::Timer, now);
        machine.settle();
        assert_eq!(machine.state(), SyncState::Settled);
        assert_eq!(machine.admit(TriggerSource::Visibility, now), Admission::Start);
    }

    #[test]
    fn failure_defers_automatic_triggers() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        machine.admit(TriggerSource::Timer, now);
        let delay = machine.fail(FailureKind::Network, now, fixed(500));
        assert_eq!(delay, Some(Duration::from_millis(500)));
        assert_eq!(machine.consecutive_failures(), 1);

        let later = now + Duration::from_millis(200);
        assert_eq!(
            machine.admit(TriggerSource::Timer, later),
            Admission::Deferred(DeferReason::Backoff {
                remaining: Duration::from_millis(300)
            })
        );

        let after = now + Duration::from_millis(500);
        assert_eq!(machine.admit(TriggerSource::Retry, after), Admission::Start);
    }

    #[test]
    fn manual_bypasses_backoff() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        machine.admit(TriggerSource::Timer, now);
        machine.fail(FailureKind::Network, now, fixed(60_000));
        assert_eq!(machine.admit(TriggerSource::Manual, now), Admission::Start);
    }

    #[test]
    fn auth_failure_blocks_until_manual() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        machine.admit(TriggerSource::Timer, now);
        assert_eq!(machine.fail(FailureKind::Auth, now, fixed(1)), None);

        let much_later = now + Duration::from_secs(3600);
        assert_eq!(
            machine.admit(TriggerSource::Visibility, much_later),
            Admission::Deferred(DeferReason::AuthRequired)
        );
        assert_eq!(machine.admit(TriggerSource::Manual, much_later), Admission::Start);
        machine.settle();
        assert_eq!(machine.admit(TriggerSource::Timer, much_later), Admission::Start);
    }

    #[test]
    fn reauthentication_clears_block() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        machine.admit(TriggerSource::Timer, now);
        machine.fail(FailureKind::Auth, now, fixed(1));
        machine.reauthenticated();
        assert_eq!(machine.consecutive_failures(), 0);
        assert_eq!(machine.admit(TriggerSource::Timer, now), Admission::Start);
    }

    #[test]
    fn abandon_only_resets_active() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        machine.admit(TriggerSource::Timer, now);
        machine.abandon();
        assert_eq!(machine.state(), SyncState::Idle);

        machine.admit(TriggerSource::Timer, now);
        machine.settle();
        machine.abandon();
        assert_eq!(machine.state(), SyncState::Settled);
    }

    #[test]
    fn backoff_sees_failure_count() {
        let now = Instant::now();
        let mut machine = TypeMachine::default();
        for expected in 1..=3u32 {
            machine.admit(TriggerSource::Manual, now);
            let delay = machine.fail(FailureKind::Network, now, |n| {
                assert_eq!(n, expected);
                Duration::from_millis(u64::from(n))
            });
            assert_eq!(delay, Some(Duration::from_millis(u64::from(expected))));
        }
    }
}
