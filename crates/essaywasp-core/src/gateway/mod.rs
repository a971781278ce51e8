//! Boundaries to the services the session depends on.
//!
//! Every collaborator is consumed through a trait so the session can be
//! wired to real services or to in-process doubles.

mod http_ai;
mod memory;
mod traits;

pub use http_ai::HttpAiGateway;
pub use memory::{MemoryDeadlineStore, StaticIdentity};
pub use traits::{Account, AiGateway, DeadlineStore, EssayStore, IdentitySource, DEADLINE_KEY};
