pub mod config;
pub mod essays;
pub mod session;

use std::sync::Arc;

use essaywasp_core::gateway::StaticIdentity;
use essaywasp_core::{Collaborators, Config, Database, EssaySession, HttpAiGateway, SystemClock};

/// Build a session for the configured account over the local database.
pub fn open_session(config: &Config) -> Result<Arc<EssaySession>, Box<dyn std::error::Error>> {
    let db = Arc::new(Database::open()?);
    let ai = HttpAiGateway::new(
        &config.ai.endpoint,
        config.ai.api_key.clone(),
        config.ai.timeout(),
    )?;
    let collaborators = Collaborators {
        ai: Arc::new(ai),
        store: db.clone(),
        deadlines: db,
        identity: Arc::new(StaticIdentity::new(config.account())),
        clock: Arc::new(SystemClock),
    };
    Ok(Arc::new(EssaySession::new(
        collaborators,
        config.session.duration(),
    )))
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
