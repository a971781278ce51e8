//! Essay records and topics.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// The in-progress essay mirrored to storage so a restarted process can
/// resume it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempEssay {
    pub id: i64,
    pub question: String,
    pub essay_text: String,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
    /// Set once the session was saved to history or discarded; closed
    /// records are never resumed.
    #[serde(default)]
    pub closed: bool,
}

/// An immutable entry of the essay history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedEssay {
    pub id: i64,
    pub question: String,
    pub essay_text: String,
    pub feedback: String,
    pub created_at: DateTime<Utc>,
}

/// Fields of a saved essay before storage assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSavedEssay {
    pub question: String,
    pub essay_text: String,
    pub feedback: String,
}

/// Order essays for display, newest first.
pub fn sort_newest_first(essays: &mut [SavedEssay]) {
    essays.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// Essay types offered when picking a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EssayTopic {
    Opinion,
    Discussion,
    Solution,
    Direct,
    /// Advantages / disadvantages
    Adv,
}

impl EssayTopic {
    pub const ALL: [EssayTopic; 5] = [
        EssayTopic::Opinion,
        EssayTopic::Discussion,
        EssayTopic::Solution,
        EssayTopic::Direct,
        EssayTopic::Adv,
    ];

    /// Identifier sent to the question generator.
    pub fn as_str(self) -> &'static str {
        match self {
            EssayTopic::Opinion => "opinion",
            EssayTopic::Discussion => "discussion",
            EssayTopic::Solution => "solution",
            EssayTopic::Direct => "direct",
            EssayTopic::Adv => "adv",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EssayTopic::Opinion => "Opinion",
            EssayTopic::Discussion => "Discussion",
            EssayTopic::Solution => "Solution",
            EssayTopic::Direct => "Direct",
            EssayTopic::Adv => "Advantages / Disadvantages",
        }
    }
}

impl fmt::Display for EssayTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EssayTopic {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EssayTopic::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "topic".into(),
                message: format!("unknown essay type '{s}'"),
            })
    }
}
