use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PreconditionError;
use crate::timer::Countdown;

/// Lifecycle stage of an essay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    /// A question has been requested and not yet returned.
    AwaitingQuestion,
    Active,
    Finished,
}

/// Mutating operation currently suspended on I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOp {
    Finish,
    Commit,
    Resume,
    SyncTemp,
}

/// Everything a front-end needs to render a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    phase: Phase,
    session_id: Option<Uuid>,
    topic: String,
    question: String,
    essay_text: String,
    feedback: String,
    timer: Countdown,
    /// Bumped on every phase transition and reset. Operations compare it
    /// before and after suspending to detect stale results.
    version: u64,
    pending: Option<PendingOp>,
    temp_persisted: bool,
    committed: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            session_id: None,
            topic: String::new(),
            question: String::new(),
            essay_text: String::new(),
            feedback: String::new(),
            timer: Countdown::default(),
            version: 0,
            pending: None,
            temp_persisted: false,
            committed: false,
        }
    }
}

impl SessionState {
    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn essay_text(&self) -> &str {
        &self.essay_text
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    pub fn timer(&self) -> &Countdown {
        &self.timer
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn pending(&self) -> Option<PendingOp> {
        self.pending
    }

    /// Whether the in-progress record reached storage.
    pub fn is_temp_persisted(&self) -> bool {
        self.temp_persisted
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    // ── Guards ───────────────────────────────────────────────────────

    pub(crate) fn ensure_not_busy(&self, operation: &'static str) -> Result<(), PreconditionError> {
        if self.pending.is_some() || self.phase == Phase::AwaitingQuestion {
            return Err(PreconditionError::Busy { operation });
        }
        Ok(())
    }

    pub(crate) fn ensure_phase(
        &self,
        operation: &'static str,
        expected: Phase,
    ) -> Result<(), PreconditionError> {
        if self.phase != expected {
            return Err(PreconditionError::InvalidPhase {
                operation,
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    // ── Reducers ─────────────────────────────────────────────────────

    pub(crate) fn transition(&mut self, phase: Phase) {
        self.phase = phase;
        self.version += 1;
    }

    /// Drop the session and return to `Idle`, invalidating anything in
    /// flight.
    pub(crate) fn reset_to_idle(&mut self) {
        *self = SessionState {
            version: self.version + 1,
            ..SessionState::default()
        };
    }

    pub(crate) fn begin(&mut self, op: PendingOp) -> u64 {
        self.pending = Some(op);
        self.version
    }

    /// Clear the pending marker if `token` is still current. Returns
    /// whether it was.
    pub(crate) fn settle(&mut self, token: u64) -> bool {
        if self.version != token {
            return false;
        }
        self.pending = None;
        true
    }

    pub(crate) fn set_session(&mut self, session_id: Uuid, topic: String) {
        self.session_id = Some(session_id);
        self.topic = topic;
    }

    pub(crate) fn set_question(&mut self, question: String, persisted: bool) {
        self.question = question;
        self.temp_persisted = persisted;
    }

    pub(crate) fn set_essay_text(&mut self, text: String) {
        self.essay_text = text;
    }

    pub(crate) fn set_feedback(&mut self, feedback: String) {
        self.feedback = feedback;
    }

    pub(crate) fn restore_texts(&mut self, question: String, essay_text: String, feedback: String) {
        self.question = question;
        self.essay_text = essay_text;
        self.feedback = feedback;
        self.temp_persisted = true;
    }

    pub(crate) fn mark_temp_persisted(&mut self) {
        self.temp_persisted = true;
    }

    pub(crate) fn mark_committed(&mut self) {
        self.committed = true;
    }

    pub(crate) fn timer_mut(&mut self) -> &mut Countdown {
        &mut self.timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_idle() {
        let state = SessionState::default();
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.question().is_empty());
        assert!(!state.timer().is_running());
    }

    #[test]
    fn transitions_bump_version() {
        let mut state = SessionState::default();
        state.transition(Phase::AwaitingQuestion);
        state.transition(Phase::Active);
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn awaiting_question_counts_as_busy() {
        let mut state = SessionState::default();
        state.transition(Phase::AwaitingQuestion);
        assert_eq!(
            state.ensure_not_busy("finish_session"),
            Err(PreconditionError::Busy {
                operation: "finish_session"
            })
        );
    }

    #[test]
    fn reset_invalidates_pending_token() {
        let mut state = SessionState::default();
        state.transition(Phase::Active);
        let token = state.begin(PendingOp::Finish);
        state.reset_to_idle();
        assert!(!state.settle(token));
        assert_eq!(state.pending(), None);
        assert_eq!(state.phase(), Phase::Idle);
        assert!(state.version() > token);
    }

    #[test]
    fn settle_with_current_token_clears_pending() {
        let mut state = SessionState::default();
        let token = state.begin(PendingOp::Commit);
        assert!(state.settle(token));
        assert_eq!(state.pending(), None);
    }
}
