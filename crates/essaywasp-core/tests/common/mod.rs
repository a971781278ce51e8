//! Shared doubles for session integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use essaywasp_core::gateway::{MemoryDeadlineStore, StaticIdentity};
use essaywasp_core::{
    Account, AiGateway, Collaborators, Database, EssaySession, EssayStore, GatewayError,
    ManualClock, NewSavedEssay, SavedEssay, TempEssay,
};

pub const EMAIL: &str = "writer@example.com";
pub const T0: u64 = 1_700_000_000_000;

// ============================================================================
// AI double
// ============================================================================

#[derive(Default)]
pub struct ScriptedAi {
    pub question_calls: AtomicUsize,
    pub feedback_calls: AtomicUsize,
    pub fail_questions: AtomicBool,
    pub fail_feedback: AtomicBool,
}

#[async_trait]
impl AiGateway for ScriptedAi {
    async fn generate_question(&self, topic: &str) -> Result<String, GatewayError> {
        self.question_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_questions.load(Ordering::SeqCst) {
            return Err(GatewayError::ai("model overloaded"));
        }
        Ok(format!("Question about {topic}"))
    }

    async fn generate_feedback(&self, question: &str, essay: &str) -> Result<String, GatewayError> {
        self.feedback_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_feedback.load(Ordering::SeqCst) {
            return Err(GatewayError::ai("model overloaded"));
        }
        Ok(format!("Feedback on '{question}' ({} words)", essay.split_whitespace().count()))
    }
}

// ============================================================================
// Store double: SQLite with failure switches
// ============================================================================

pub struct FlakyStore {
    pub db: Database,
    pub fail_temp_insert: AtomicBool,
    pub fail_temp_update: AtomicBool,
    pub fail_saved_insert: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            db: Database::open_memory().unwrap(),
            fail_temp_insert: AtomicBool::new(false),
            fail_temp_update: AtomicBool::new(false),
            fail_saved_insert: AtomicBool::new(false),
        }
    }
}

fn offline() -> GatewayError {
    GatewayError::persistence("storage offline")
}

#[async_trait]
impl EssayStore for FlakyStore {
    async fn insert_temp(&self, email: &str, question: &str) -> Result<i64, GatewayError> {
        if self.fail_temp_insert.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.db.insert_temp(email, question).await
    }

    async fn update_latest_temp(
        &self,
        email: &str,
        essay_text: &str,
        feedback: &str,
    ) -> Result<(), GatewayError> {
        if self.fail_temp_update.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.db.update_latest_temp(email, essay_text, feedback).await
    }

    async fn latest_temp(&self, email: &str) -> Result<Option<TempEssay>, GatewayError> {
        self.db.latest_temp(email).await
    }

    async fn close_latest_temp(&self, email: &str) -> Result<(), GatewayError> {
        self.db.close_latest_temp(email).await
    }

    async fn insert_saved(
        &self,
        email: &str,
        essay: &NewSavedEssay,
    ) -> Result<SavedEssay, GatewayError> {
        if self.fail_saved_insert.load(Ordering::SeqCst) {
            return Err(offline());
        }
        self.db.insert_saved(email, essay).await
    }

    async fn saved_essays(&self, email: &str) -> Result<Vec<SavedEssay>, GatewayError> {
        self.db.saved_essays(email).await
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub ai: Arc<ScriptedAi>,
    pub store: Arc<FlakyStore>,
    pub deadlines: Arc<MemoryDeadlineStore>,
    pub clock: ManualClock,
    pub session: Arc<EssaySession>,
}

impl Harness {
    pub fn with_credits(credits: u32) -> Self {
        Self::build(credits, Duration::from_secs(40 * 60))
    }

    pub fn with_duration_secs(secs: u64) -> Self {
        Self::build(20, Duration::from_secs(secs))
    }

    pub fn build(credits: u32, duration: Duration) -> Self {
        let ai = Arc::new(ScriptedAi::default());
        let store = Arc::new(FlakyStore::new());
        let deadlines = Arc::new(MemoryDeadlineStore::default());
        let clock = ManualClock::new(T0);
        let session = Self::session_over(&ai, &store, &deadlines, &clock, credits, duration);
        Self {
            ai,
            store,
            deadlines,
            clock,
            session,
        }
    }

    /// A second session over the same storage, as after a restart.
    pub fn restart(&self, credits: u32) -> Arc<EssaySession> {
        Self::session_over(
            &self.ai,
            &self.store,
            &self.deadlines,
            &self.clock,
            credits,
            Duration::from_secs(40 * 60),
        )
    }

    fn session_over(
        ai: &Arc<ScriptedAi>,
        store: &Arc<FlakyStore>,
        deadlines: &Arc<MemoryDeadlineStore>,
        clock: &ManualClock,
        credits: u32,
        duration: Duration,
    ) -> Arc<EssaySession> {
        let collaborators = Collaborators {
            ai: ai.clone(),
            store: store.clone(),
            deadlines: deadlines.clone(),
            identity: Arc::new(StaticIdentity::new(Account {
                email: EMAIL.into(),
                credits,
                premium: false,
            })),
            clock: Arc::new(clock.clone()),
        };
        Arc::new(EssaySession::new(collaborators, duration))
    }
}
