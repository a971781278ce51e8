mod machine;
mod poller;
mod state;

pub use machine::{Collaborators, EssaySession};
pub use poller::{spawn_poller, PollerHandle};
pub use state::{PendingOp, Phase, SessionState};
