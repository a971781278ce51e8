//! # Essay Wasp Core Library
//!
//! Core logic for timed essay practice: pick a topic, get an AI-generated
//! question, write against a countdown, receive AI feedback, keep a history.
//! Front-ends (the CLI, a web shell) only invoke session operations and
//! render the state this crate exposes.
//!
//! ## Architecture
//!
//! - **Session**: [`EssaySession`] owns the lifecycle
//!   `Idle -> AwaitingQuestion -> Active -> Finished` and reduces gateway
//!   results into [`SessionState`]
//! - **Timer**: a deadline-based [`Countdown`] that recomputes remaining time
//!   from a persisted wall-clock deadline
//! - **Credit gate**: [`can_start_session`] decides whether a balance can pay
//!   for a session
//! - **Gateways**: traits for the AI service, essay storage, the deadline
//!   slot and the identity source, with HTTP and SQLite implementations
//! - **Storage**: SQLite essay storage and TOML-based configuration

pub mod credit;
pub mod error;
pub mod essay;
pub mod events;
pub mod gateway;
pub mod session;
pub mod storage;
pub mod timer;

pub use credit::{can_start_session, SESSION_COST};
pub use error::{
    ConfigError, CoreError, DatabaseError, GatewayError, PreconditionError, SessionError,
    ValidationError,
};
pub use essay::{EssayTopic, NewSavedEssay, SavedEssay, TempEssay};
pub use events::Event;
pub use gateway::{Account, AiGateway, DeadlineStore, EssayStore, HttpAiGateway, IdentitySource};
pub use session::{spawn_poller, Collaborators, EssaySession, Phase, PollerHandle, SessionState};
pub use storage::{Config, Database};
pub use timer::{Clock, Countdown, Hms, ManualClock, SystemClock, TimerDisplay};
