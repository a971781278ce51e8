use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use essaywasp_core::{spawn_poller, Config, EssaySession, EssayTopic, Event, Phase};

use super::{open_session, print_json};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Request a question and start the countdown
    Start {
        /// Essay type: opinion, discussion, solution, direct, adv
        topic: EssayTopic,
    },
    /// Submit the essay for feedback
    Finish {
        /// Essay text
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        /// Read the essay from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Save the finished essay to history and close the session
    Commit,
    /// Discard the current session
    Reset,
    /// Print the current session state as JSON
    Status,
    /// Follow the countdown; submits the essay file when time is up
    Watch {
        /// Essay file, re-read every second
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Retry storing the in-progress record
    Sync,
    /// List the available essay types
    Topics,
}

fn read_essay(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()).into())
}

pub async fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let session = open_session(&config)?;
    if let Some(event) = session.resume().await? {
        tracing::debug!(?event, "resumed stored session");
    }

    match action {
        SessionAction::Start { topic } => {
            let event = session.start_session(topic.as_str()).await?;
            print_json(&event)?;
        }
        SessionAction::Finish { text, file } => {
            let text = match (text, file) {
                (Some(text), _) => Some(text),
                (None, Some(path)) => Some(read_essay(&path)?),
                (None, None) => None,
            };
            let expired = expire_if_due(&session)?;
            match text {
                Some(_) if expired => {
                    tracing::warn!("time is up; submitting the text stored before the deadline");
                }
                Some(text) => session.update_essay_text(text)?,
                None => {}
            }
            let event = session.finish_session().await?;
            print_json(&event)?;
        }
        SessionAction::Commit => {
            let event = session.commit_session().await?;
            print_json(&event)?;
            session.reset().await;
        }
        SessionAction::Reset => {
            let event = session.reset().await;
            print_json(&event)?;
        }
        SessionAction::Status => {
            let expired = session.tick().filter(|e| matches!(e, Event::TimerExpired { .. }));
            print_json(&session.snapshot())?;
            if let Some(event) = expired {
                print_json(&event)?;
            }
        }
        SessionAction::Watch { file } => watch(&session, file.as_deref()).await?,
        SessionAction::Sync => match session.sync_temp_record().await? {
            Some(event) => print_json(&event)?,
            None => println!("{{\"type\": \"already_synced\"}}"),
        },
        SessionAction::Topics => {
            for topic in EssayTopic::ALL {
                println!("{:<12}{}", topic.as_str(), topic.label());
            }
        }
    }
    Ok(())
}

/// Whether the countdown has run out; reports the expiry if this poll
/// is the one that noticed it.
fn expire_if_due(session: &EssaySession) -> Result<bool, Box<dyn std::error::Error>> {
    if let Some(event @ Event::TimerExpired { .. }) = session.tick() {
        print_json(&event)?;
    }
    Ok(session.state().timer().is_expired())
}

async fn watch(
    session: &std::sync::Arc<EssaySession>,
    file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if session.phase() != Phase::Active {
        return Err(format!("no active session (phase: {:?})", session.phase()).into());
    }
    if session.state().timer().is_expired() {
        print_json(&session.finish_session().await?)?;
        return Ok(());
    }

    let (handle, mut events) = spawn_poller(session.clone(), Duration::from_secs(1));
    while let Some(event) = events.recv().await {
        match event {
            Event::TimerTicked { remaining, .. } => {
                eprint!("\r{remaining} left ");
                if let Some(path) = file {
                    match read_essay(path) {
                        Ok(text) => {
                            if let Err(e) = session.update_essay_text(text) {
                                tracing::warn!(error = %e, "essay text not updated");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "essay file unreadable"),
                    }
                }
            }
            Event::TimerExpired { .. } => {
                eprintln!();
                print_json(&event)?;
                print_json(&session.finish_session().await?)?;
            }
            other => print_json(&other)?,
        }
    }
    handle.stop().await;
    Ok(())
}
