//! Deadline-based countdown.
//!
//! The countdown never decrements a counter. Every query recomputes the
//! remaining time from an absolute deadline, which is also written to a
//! durable [`DeadlineStore`] so a restarted process picks up where the
//! previous one left off.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Running (arm) -> Stopped (expiry | manual finish)
//! ```
//!
//! There is no pause.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::hms::Hms;
use crate::gateway::DeadlineStore;

/// Seconds left when the forced finish fires. The countdown cuts off one
/// second before natural exhaustion.
pub const EXPIRY_AT_SECS: u64 = 1;

/// Whole seconds until `deadline_ms`, floored, never negative.
pub fn remaining_seconds(deadline_ms: u64, now_ms: u64) -> u64 {
    deadline_ms.saturating_sub(now_ms) / 1000
}

/// Result of one poll of a running countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still running with this much time left.
    Remaining(Hms),
    /// The forced finish trigger. Emitted once per armed countdown.
    Expired,
}

/// What a timer widget should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "time", rename_all = "lowercase")]
pub enum TimerDisplay {
    Hidden,
    /// Live countdown recomputed from the deadline.
    Counting(Hms),
    /// Time captured when the session finished.
    Frozen(Hms),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    deadline_epoch_ms: Option<u64>,
    is_running: bool,
    remaining_at_finish: Option<Hms>,
    #[serde(default)]
    expired: bool,
}

impl Countdown {
    // ── Queries ──────────────────────────────────────────────────────

    pub fn deadline_epoch_ms(&self) -> Option<u64> {
        self.deadline_epoch_ms
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn remaining_at_finish(&self) -> Option<Hms> {
        self.remaining_at_finish
    }

    /// Whether the forced finish has already fired.
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    pub fn remaining(&self, now_ms: u64) -> Option<Hms> {
        self.deadline_epoch_ms
            .map(|deadline| Hms::from_secs(remaining_seconds(deadline, now_ms)))
    }

    pub fn display(&self, now_ms: u64) -> TimerDisplay {
        match (self.is_running, self.remaining_at_finish) {
            (true, None) => self
                .remaining(now_ms)
                .map(TimerDisplay::Counting)
                .unwrap_or(TimerDisplay::Hidden),
            (false, Some(frozen)) => TimerDisplay::Frozen(frozen),
            _ => TimerDisplay::Hidden,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start the countdown and persist its deadline.
    ///
    /// A failed write to `store` is logged and ignored: the in-memory
    /// deadline still drives this process, only restart recovery is lost.
    pub fn arm(&mut self, store: &dyn DeadlineStore, now_ms: u64, duration_secs: u64) -> u64 {
        let deadline = now_ms.saturating_add(duration_secs.saturating_mul(1000));
        if let Err(e) = store.save(deadline) {
            warn!(error = %e, deadline, "failed to persist countdown deadline");
        }
        *self = Countdown {
            deadline_epoch_ms: Some(deadline),
            is_running: true,
            remaining_at_finish: None,
            expired: false,
        };
        deadline
    }

    /// Continue a countdown from a deadline read back from storage.
    ///
    /// A deadline that is already due comes back expired and frozen at
    /// `00:00:00`, so it never fires a second time.
    pub fn restore(deadline_ms: u64, now_ms: u64) -> Self {
        if remaining_seconds(deadline_ms, now_ms) <= EXPIRY_AT_SECS {
            return Countdown {
                deadline_epoch_ms: Some(deadline_ms),
                is_running: false,
                remaining_at_finish: Some(Hms::ZERO),
                expired: true,
            };
        }
        Countdown {
            deadline_epoch_ms: Some(deadline_ms),
            is_running: true,
            remaining_at_finish: None,
            expired: false,
        }
    }

    /// Call once per second while running.
    ///
    /// Returns `None` without reading the deadline once the countdown has
    /// stopped. Fires [`Tick::Expired`] as soon as one second or less is
    /// left, including the case where the one-second mark itself was never
    /// observed.
    pub fn tick(&mut self, now_ms: u64) -> Option<Tick> {
        if !self.is_running || self.expired {
            return None;
        }
        let deadline = self.deadline_epoch_ms?;
        let left = remaining_seconds(deadline, now_ms);
        if left <= EXPIRY_AT_SECS {
            self.expired = true;
            self.is_running = false;
            self.remaining_at_finish.get_or_insert(Hms::ZERO);
            return Some(Tick::Expired);
        }
        Some(Tick::Remaining(Hms::from_secs(left)))
    }

    /// Capture the time left at a manual finish. Only the first capture
    /// sticks.
    pub fn snapshot_remaining(&mut self, now_ms: u64) -> Hms {
        let current = self.remaining(now_ms).unwrap_or(Hms::ZERO);
        *self.remaining_at_finish.get_or_insert(current)
    }

    /// Stop for good and forget the deadline.
    pub fn stop(&mut self) {
        self.is_running = false;
        self.deadline_epoch_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryDeadlineStore;
    use proptest::prelude::*;

    const T0: u64 = 1_700_000_000_000;

    #[test]
    fn remaining_is_floored_and_never_negative() {
        assert_eq!(remaining_seconds(T0 + 2_999, T0), 2);
        assert_eq!(remaining_seconds(T0 + 1_000, T0), 1);
        assert_eq!(remaining_seconds(T0, T0), 0);
        assert_eq!(remaining_seconds(T0, T0 + 60_000), 0);
    }

    #[test]
    fn arm_persists_deadline() {
        let store = MemoryDeadlineStore::default();
        let mut countdown = Countdown::default();
        let deadline = countdown.arm(&store, T0, 40 * 60);
        assert_eq!(deadline, T0 + 2_400_000);
        assert_eq!(store.load().unwrap(), Some(deadline));
        assert!(countdown.is_running());
        assert_eq!(countdown.remaining(T0), Some(Hms::from_secs(2400)));
    }

    #[test]
    fn expiry_fires_at_one_second_not_zero() {
        let store = MemoryDeadlineStore::default();
        let mut countdown = Countdown::default();
        countdown.arm(&store, T0, 3);

        assert_eq!(countdown.tick(T0), Some(Tick::Remaining(Hms::from_secs(3))));
        assert_eq!(
            countdown.tick(T0 + 1_000),
            Some(Tick::Remaining(Hms::from_secs(2)))
        );
        assert_eq!(countdown.tick(T0 + 2_000), Some(Tick::Expired));
        assert_eq!(countdown.remaining_at_finish(), Some(Hms::ZERO));
        assert!(!countdown.is_running());

        // Reaching zero afterwards does not fire again.
        assert_eq!(countdown.tick(T0 + 3_000), None);
    }

    #[test]
    fn one_second_timer_fires_exactly_once() {
        let store = MemoryDeadlineStore::default();
        let mut countdown = Countdown::default();
        countdown.arm(&store, T0, 1);

        let fired = (0..5)
            .filter_map(|i| countdown.tick(T0 + i * 500))
            .filter(|t| *t == Tick::Expired)
            .count();
        assert_eq!(fired, 1);
        assert_eq!(countdown.remaining_at_finish().unwrap().to_string(), "00:00:00");
    }

    #[test]
    fn restored_before_deadline_keeps_counting() {
        let mut countdown = Countdown::restore(T0 + 60_000, T0);
        assert!(countdown.is_running());
        assert_eq!(
            countdown.tick(T0 + 30_000),
            Some(Tick::Remaining(Hms::from_secs(30)))
        );
        assert_eq!(countdown.tick(T0 + 59_000), Some(Tick::Expired));
    }

    #[test]
    fn restored_past_deadline_is_already_expired() {
        let mut countdown = Countdown::restore(T0, T0 + 90_000);
        assert!(countdown.is_expired());
        assert!(!countdown.is_running());
        assert_eq!(countdown.tick(T0 + 91_000), None);
        assert_eq!(countdown.display(T0 + 91_000), TimerDisplay::Frozen(Hms::ZERO));
        assert_eq!(countdown.snapshot_remaining(T0 + 95_000), Hms::ZERO);
    }

    #[test]
    fn manual_snapshot_is_captured_once() {
        let store = MemoryDeadlineStore::default();
        let mut countdown = Countdown::default();
        countdown.arm(&store, T0, 600);

        let first = countdown.snapshot_remaining(T0 + 100_000);
        assert_eq!(first.to_string(), "00:08:20");
        let second = countdown.snapshot_remaining(T0 + 200_000);
        assert_eq!(second, first);
    }

    #[test]
    fn stopped_countdown_never_reads_deadline() {
        let store = MemoryDeadlineStore::default();
        let mut countdown = Countdown::default();
        countdown.arm(&store, T0, 2);
        countdown.snapshot_remaining(T0);
        countdown.stop();
        assert_eq!(countdown.tick(T0 + 1_500), None);
        assert_eq!(countdown.deadline_epoch_ms(), None);
    }

    #[test]
    fn display_follows_running_and_snapshot() {
        let store = MemoryDeadlineStore::default();
        let mut countdown = Countdown::default();
        assert_eq!(countdown.display(T0), TimerDisplay::Hidden);

        countdown.arm(&store, T0, 90);
        assert_eq!(
            countdown.display(T0 + 30_000),
            TimerDisplay::Counting(Hms::from_secs(60))
        );

        countdown.snapshot_remaining(T0 + 30_000);
        countdown.stop();
        assert_eq!(
            countdown.display(T0 + 80_000),
            TimerDisplay::Frozen(Hms::from_secs(60))
        );
    }

    proptest! {
        #[test]
        fn remaining_is_monotonic(deadline in 0u64..10_000_000, a in 0u64..10_000_000, b in 0u64..10_000_000) {
            let (earlier, later) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(remaining_seconds(deadline, later) <= remaining_seconds(deadline, earlier));
        }
    }
}
