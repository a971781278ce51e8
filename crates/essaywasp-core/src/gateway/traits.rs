use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::credit::can_start_session;
use crate::essay::{NewSavedEssay, SavedEssay, TempEssay};
use crate::error::GatewayError;

/// Key under which the countdown deadline is kept.
pub const DEADLINE_KEY: &str = "countdown_end_time";

/// Text generation service. Opaque request/response: the crate only cares
/// about the returned text or the error message.
#[async_trait]
pub trait AiGateway: Send + Sync {
    /// Generate an essay question for a topic.
    async fn generate_question(&self, topic: &str) -> Result<String, GatewayError>;

    /// Generate feedback for an essay written against `question`.
    async fn generate_feedback(&self, question: &str, essay: &str)
        -> Result<String, GatewayError>;
}

/// Durable essay storage keyed by user email.
#[async_trait]
pub trait EssayStore: Send + Sync {
    /// Insert a new in-progress record holding only the question.
    async fn insert_temp(&self, email: &str, question: &str) -> Result<i64, GatewayError>;

    /// Write text and feedback into the most recent in-progress record.
    async fn update_latest_temp(
        &self,
        email: &str,
        essay_text: &str,
        feedback: &str,
    ) -> Result<(), GatewayError>;

    /// Most recent in-progress record, if any.
    async fn latest_temp(&self, email: &str) -> Result<Option<TempEssay>, GatewayError>;

    /// Flag the most recent in-progress record as no longer resumable
    /// (saved to history or discarded).
    async fn close_latest_temp(&self, email: &str) -> Result<(), GatewayError>;

    /// Append an essay to the history.
    async fn insert_saved(
        &self,
        email: &str,
        essay: &NewSavedEssay,
    ) -> Result<SavedEssay, GatewayError>;

    /// All history entries for a user, in no particular order.
    async fn saved_essays(&self, email: &str) -> Result<Vec<SavedEssay>, GatewayError>;
}

/// Local key-value slot holding the countdown deadline (epoch ms).
pub trait DeadlineStore: Send + Sync {
    fn load(&self) -> Result<Option<u64>, GatewayError>;
    fn save(&self, deadline_ms: u64) -> Result<(), GatewayError>;
    fn clear(&self) -> Result<(), GatewayError>;
}

/// Read-only view of the signed-in user as reported by the identity
/// provider.
pub trait IdentitySource: Send + Sync {
    fn account(&self) -> Account;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub credits: u32,
    /// Subscribers have unlimited credits.
    #[serde(default)]
    pub premium: bool,
}

impl Account {
    pub fn may_start_session(&self) -> bool {
        self.premium || can_start_session(self.credits)
    }
}
