//! Essay session state machine.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> AwaitingQuestion -> Active -> Finished
//!   ^            |                          |
//!   +--(AI error)+        (reset) ----------+--> Idle
//! ```
//!
//! Operations are async and suspend on the AI and persistence gateways.
//! The state lock is never held across an `.await`: each operation checks
//! its preconditions, marks itself in flight, releases the lock, awaits,
//! then re-locks and applies its result only if the session has not moved
//! on in the meantime.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{PendingOp, Phase, SessionState};
use crate::credit::SESSION_COST;
use crate::essay::{sort_newest_first, NewSavedEssay, SavedEssay};
use crate::error::{GatewayError, PreconditionError, SessionError, ValidationError};
use crate::events::Event;
use crate::gateway::{AiGateway, DeadlineStore, EssayStore, IdentitySource};
use crate::timer::{Clock, Countdown, Hms, Tick, TimerDisplay};

/// External services a session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub ai: Arc<dyn AiGateway>,
    pub store: Arc<dyn EssayStore>,
    pub deadlines: Arc<dyn DeadlineStore>,
    pub identity: Arc<dyn IdentitySource>,
    pub clock: Arc<dyn Clock>,
}

/// One user's essay session. Construct one per user context; nothing here
/// is global.
pub struct EssaySession {
    state: Mutex<SessionState>,
    ai: Arc<dyn AiGateway>,
    store: Arc<dyn EssayStore>,
    deadlines: Arc<dyn DeadlineStore>,
    identity: Arc<dyn IdentitySource>,
    clock: Arc<dyn Clock>,
    duration: Duration,
}

impl EssaySession {
    /// `duration` is the length of every session's countdown, whole
    /// seconds only.
    pub fn new(collaborators: Collaborators, duration: Duration) -> Self {
        let Collaborators {
            ai,
            store,
            deadlines,
            identity,
            clock,
        } = collaborators;
        Self {
            state: Mutex::new(SessionState::default()),
            ai,
            store,
            deadlines,
            identity,
            clock,
            duration,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase()
    }

    pub fn timer_display(&self) -> TimerDisplay {
        let now = self.clock.now_ms();
        self.lock().timer().display(now)
    }

    /// Build a full state snapshot event.
    pub fn snapshot(&self) -> Event {
        let now = self.clock.now_ms();
        let state = self.lock();
        Event::StateSnapshot {
            phase: state.phase(),
            session_id: state.session_id(),
            topic: state.topic().to_string(),
            question: state.question().to_string(),
            essay_text: state.essay_text().to_string(),
            feedback: state.feedback().to_string(),
            timer: state.timer().display(now),
            deadline_epoch_ms: state.timer().deadline_epoch_ms(),
            at: Utc::now(),
        }
    }

    /// Saved essays of the current user, newest first.
    pub async fn saved_essays(&self) -> Result<Vec<SavedEssay>, SessionError> {
        let account = self.identity.account();
        let mut essays = self.store.saved_essays(&account.email).await?;
        sort_newest_first(&mut essays);
        Ok(essays)
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Request a question for `topic` and start the countdown.
    ///
    /// Storing the in-progress record is best effort: if the AI call
    /// succeeds but the insert fails, the session still becomes `Active`
    /// and the returned event carries `persisted: false`. Call
    /// [`sync_temp_record`](Self::sync_temp_record) to retry.
    pub async fn start_session(&self, topic: &str) -> Result<Event, SessionError> {
        const OP: &str = "start_session";
        let topic = topic.trim();
        let account = self.identity.account();

        let (token, session_id) = {
            let mut state = self.lock();
            state.ensure_not_busy(OP)?;
            state.ensure_phase(OP, Phase::Idle)?;
            if topic.is_empty() {
                return Err(ValidationError::EmptyField { field: "topic" }.into());
            }
            if !account.may_start_session() {
                return Err(PreconditionError::InsufficientCredits {
                    balance: account.credits,
                    required: SESSION_COST,
                }
                .into());
            }
            let session_id = Uuid::new_v4();
            state.set_session(session_id, topic.to_string());
            state.transition(Phase::AwaitingQuestion);
            (state.version(), session_id)
        };

        info!(%session_id, topic, "requesting essay question");
        let question = match self.ai.generate_question(topic).await {
            Ok(question) => question,
            Err(e) => {
                warn!(%session_id, error = %e, "question generation failed");
                let mut state = self.lock();
                if state.version() == token {
                    state.reset_to_idle();
                }
                return Err(e.into());
            }
        };

        let still_current = self.lock().version() == token;
        if !still_current {
            debug!(%session_id, "session reset while question was generated");
            return Err(PreconditionError::Stale { operation: OP }.into());
        }

        let persisted = match self.store.insert_temp(&account.email, &question).await {
            Ok(_) => true,
            Err(e) => {
                warn!(%session_id, error = %e, "in-progress essay not stored; retry with sync_temp_record");
                false
            }
        };

        let mut state = self.lock();
        if state.version() != token {
            debug!(%session_id, "session reset while question was stored");
            return Err(PreconditionError::Stale { operation: OP }.into());
        }
        let now = self.clock.now_ms();
        state.set_question(question.clone(), persisted);
        let deadline = state
            .timer_mut()
            .arm(self.deadlines.as_ref(), now, self.duration.as_secs());
        state.transition(Phase::Active);
        info!(%session_id, deadline, persisted, "session active");

        Ok(Event::SessionStarted {
            session_id,
            topic: topic.to_string(),
            question,
            deadline_epoch_ms: deadline,
            persisted,
            at: Utc::now(),
        })
    }

    /// Replace the essay text. In-memory only.
    pub fn update_essay_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        const OP: &str = "update_essay_text";
        let mut state = self.lock();
        state.ensure_not_busy(OP)?;
        state.ensure_phase(OP, Phase::Active)?;
        if state.timer().is_expired() {
            return Err(PreconditionError::TimeExpired.into());
        }
        state.set_essay_text(text.into());
        Ok(())
    }

    /// Request feedback for the current essay and close the session.
    ///
    /// Nothing changes unless both the feedback call and the temp record
    /// update succeed. An empty essay is rejected until the countdown has
    /// expired; after that the session can always be finished.
    pub async fn finish_session(&self) -> Result<Event, SessionError> {
        const OP: &str = "finish_session";
        let account = self.identity.account();

        let (token, session_id, question, essay, temp_persisted, requested_at) = {
            let mut state = self.lock();
            state.ensure_not_busy(OP)?;
            state.ensure_phase(OP, Phase::Active)?;
            // Once time is up the finish is forced, written or not.
            if state.essay_text().trim().is_empty() && !state.timer().is_expired() {
                return Err(ValidationError::EmptyField { field: "essay_text" }.into());
            }
            let token = state.begin(PendingOp::Finish);
            (
                token,
                state.session_id(),
                state.question().to_string(),
                state.essay_text().to_string(),
                state.is_temp_persisted(),
                self.clock.now_ms(),
            )
        };
        let session_id = session_id.unwrap_or_default();

        info!(%session_id, "requesting feedback");
        let result = self
            .feedback_and_store(&account.email, &question, &essay, temp_persisted)
            .await;

        let mut state = self.lock();
        if !state.settle(token) {
            debug!(%session_id, "session reset while feedback was generated");
            return Err(PreconditionError::Stale { operation: OP }.into());
        }
        let feedback = result.map_err(|e| {
            warn!(%session_id, error = %e, "finish failed; session still active");
            e
        })?;

        state.set_feedback(feedback.clone());
        state.mark_temp_persisted();
        let timer = state.timer_mut();
        let remaining_at_finish = timer.snapshot_remaining(requested_at);
        timer.stop();
        if let Err(e) = self.deadlines.clear() {
            warn!(%session_id, error = %e, "failed to clear countdown deadline");
        }
        state.transition(Phase::Finished);
        info!(%session_id, %remaining_at_finish, "session finished");

        Ok(Event::SessionFinished {
            session_id,
            feedback,
            remaining_at_finish: Some(remaining_at_finish),
            at: Utc::now(),
        })
    }

    async fn feedback_and_store(
        &self,
        email: &str,
        question: &str,
        essay: &str,
        temp_persisted: bool,
    ) -> Result<String, GatewayError> {
        let feedback = self.ai.generate_feedback(question, essay).await?;
        if !temp_persisted {
            self.store.insert_temp(email, question).await?;
        }
        self.store.update_latest_temp(email, essay, &feedback).await?;
        Ok(feedback)
    }

    /// Append the finished essay to the saved history.
    ///
    /// The session stays `Finished`; call [`reset`](Self::reset) afterwards.
    pub async fn commit_session(&self) -> Result<Event, SessionError> {
        const OP: &str = "commit_session";
        let account = self.identity.account();

        let (token, session_id, essay) = {
            let mut state = self.lock();
            state.ensure_not_busy(OP)?;
            state.ensure_phase(OP, Phase::Finished)?;
            if state.is_committed() {
                return Err(PreconditionError::AlreadyCommitted.into());
            }
            let token = state.begin(PendingOp::Commit);
            let essay = NewSavedEssay {
                question: state.question().to_string(),
                essay_text: state.essay_text().to_string(),
                feedback: state.feedback().to_string(),
            };
            (token, state.session_id().unwrap_or_default(), essay)
        };

        let result = self.store.insert_saved(&account.email, &essay).await;
        {
            let mut state = self.lock();
            if !state.settle(token) {
                debug!(%session_id, "session reset while essay was saved");
                return Err(PreconditionError::Stale { operation: OP }.into());
            }
            if result.is_ok() {
                state.mark_committed();
            }
        }
        let saved = result?;
        info!(%session_id, saved_essay_id = saved.id, "essay saved");

        if let Err(e) = self.store.close_latest_temp(&account.email).await {
            warn!(%session_id, error = %e, "saved essay left resumable");
        }

        Ok(Event::SessionCommitted {
            session_id,
            saved_essay_id: saved.id,
            at: Utc::now(),
        })
    }

    /// Drop the current session and return to `Idle`.
    ///
    /// Results of operations still in flight are discarded when they
    /// arrive. The stored deadline is cleared and an active or finished
    /// session's record is closed so it is not resumed later.
    pub async fn reset(&self) -> Event {
        let account = self.identity.account();
        let dropped = {
            let mut state = self.lock();
            let dropped = matches!(state.phase(), Phase::Active | Phase::Finished)
                && !state.is_committed();
            state.reset_to_idle();
            dropped
        };
        if let Err(e) = self.deadlines.clear() {
            warn!(error = %e, "failed to clear countdown deadline");
        }
        if dropped {
            if let Err(e) = self.store.close_latest_temp(&account.email).await {
                warn!(error = %e, "discarded essay left resumable");
            }
        }
        info!("session reset");
        Event::SessionReset { at: Utc::now() }
    }

    /// Poll the countdown. Call about once per second while the session is
    /// active.
    ///
    /// Returns `Some(Event::TimerExpired)` exactly once, when one second is
    /// left; the caller is expected to respond with
    /// [`finish_session`](Self::finish_session). Returns `None` once the
    /// countdown has stopped.
    pub fn tick(&self) -> Option<Event> {
        let mut state = self.lock();
        if state.phase() != Phase::Active || !state.timer().is_running() {
            return None;
        }
        let now = self.clock.now_ms();
        let at = Utc::now();

        // A finish is already under way; keep displaying, never force.
        if state.pending() == Some(PendingOp::Finish) {
            let remaining = state.timer().remaining(now)?;
            return Some(Event::TimerTicked { remaining, at });
        }

        let session_id = state.session_id().unwrap_or_default();
        match state.timer_mut().tick(now)? {
            Tick::Remaining(remaining) => Some(Event::TimerTicked { remaining, at }),
            Tick::Expired => {
                info!(%session_id, "time is up");
                Some(Event::TimerExpired {
                    session_id,
                    remaining_at_finish: state.timer().remaining_at_finish().unwrap_or(Hms::ZERO),
                    at,
                })
            }
        }
    }

    /// Pick up the latest unfinished session from storage.
    ///
    /// A record with feedback resumes as `Finished`; a record with only a
    /// question resumes as `Active` when a countdown deadline is stored.
    /// A deadline that passed while nothing was running resumes as an
    /// expired countdown (`expired: true`); the caller should finish it.
    /// Returns `Ok(None)` when there is nothing to resume.
    pub async fn resume(&self) -> Result<Option<Event>, SessionError> {
        const OP: &str = "resume";
        let account = self.identity.account();
        let token = {
            let mut state = self.lock();
            state.ensure_not_busy(OP)?;
            state.ensure_phase(OP, Phase::Idle)?;
            state.begin(PendingOp::Resume)
        };

        let temp = self.store.latest_temp(&account.email).await;

        let mut state = self.lock();
        if !state.settle(token) {
            return Err(PreconditionError::Stale { operation: OP }.into());
        }
        let Some(temp) = temp?.filter(|t| !t.closed && !t.question.is_empty()) else {
            return Ok(None);
        };
        let deadline = self.deadlines.load().unwrap_or_else(|e| {
            warn!(error = %e, "stored countdown deadline unreadable");
            None
        });

        let phase = match (temp.feedback.is_empty(), deadline) {
            (false, _) => Phase::Finished,
            (true, Some(_)) => Phase::Active,
            (true, None) => return Ok(None),
        };

        let session_id = Uuid::new_v4();
        state.set_session(session_id, String::new());
        state.restore_texts(temp.question.clone(), temp.essay_text, temp.feedback);
        let deadline = match (phase, deadline) {
            (Phase::Active, Some(deadline)) => {
                *state.timer_mut() = Countdown::restore(deadline, self.clock.now_ms());
                Some(deadline)
            }
            _ => None,
        };
        let expired = state.timer().is_expired();
        state.transition(phase);
        info!(%session_id, ?phase, expired, "session resumed");

        Ok(Some(Event::SessionResumed {
            session_id,
            phase,
            question: temp.question,
            deadline_epoch_ms: deadline,
            expired,
            at: Utc::now(),
        }))
    }

    /// Retry storing the in-progress record after a best-effort start
    /// failed to. Returns `Ok(None)` when the record is already stored.
    pub async fn sync_temp_record(&self) -> Result<Option<Event>, SessionError> {
        const OP: &str = "sync_temp_record";
        let account = self.identity.account();
        let (token, session_id, question) = {
            let mut state = self.lock();
            state.ensure_not_busy(OP)?;
            state.ensure_phase(OP, Phase::Active)?;
            if state.is_temp_persisted() {
                return Ok(None);
            }
            let token = state.begin(PendingOp::SyncTemp);
            (
                token,
                state.session_id().unwrap_or_default(),
                state.question().to_string(),
            )
        };

        let result = self.store.insert_temp(&account.email, &question).await;

        let mut state = self.lock();
        if !state.settle(token) {
            return Err(PreconditionError::Stale { operation: OP }.into());
        }
        result?;
        state.mark_temp_persisted();
        info!(%session_id, "in-progress essay stored");
        Ok(Some(Event::TempRecordSynced {
            session_id,
            at: Utc::now(),
        }))
    }
}
