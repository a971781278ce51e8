use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::Phase;
use crate::timer::{Hms, TimerDisplay};

/// Every state change of a session produces an Event.
/// Front-ends render them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    SessionStarted {
        session_id: Uuid,
        topic: String,
        question: String,
        deadline_epoch_ms: u64,
        /// False when the in-progress record could not be stored.
        persisted: bool,
        at: DateTime<Utc>,
    },
    /// A previous session was picked up from storage.
    SessionResumed {
        session_id: Uuid,
        phase: Phase,
        question: String,
        deadline_epoch_ms: Option<u64>,
        /// The countdown ran out before the session was picked up.
        #[serde(default)]
        expired: bool,
        at: DateTime<Utc>,
    },
    /// One countdown poll while running.
    TimerTicked {
        remaining: Hms,
        at: DateTime<Utc>,
    },
    /// Time is up. The caller should finish the session.
    TimerExpired {
        session_id: Uuid,
        remaining_at_finish: Hms,
        at: DateTime<Utc>,
    },
    SessionFinished {
        session_id: Uuid,
        feedback: String,
        remaining_at_finish: Option<Hms>,
        at: DateTime<Utc>,
    },
    SessionCommitted {
        session_id: Uuid,
        saved_essay_id: i64,
        at: DateTime<Utc>,
    },
    TempRecordSynced {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    SessionReset {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: Phase,
        session_id: Option<Uuid>,
        topic: String,
        question: String,
        essay_text: String,
        feedback: String,
        timer: TimerDisplay,
        deadline_epoch_ms: Option<u64>,
        at: DateTime<Utc>,
    },
}
