use clap::Subcommand;
use essaywasp_core::Config;

use super::{open_session, print_json};

#[derive(Subcommand)]
pub enum EssaysAction {
    /// List saved essays, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one saved essay with its feedback
    Show {
        /// Saved essay ID
        id: i64,
    },
}

pub async fn run(action: EssaysAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let session = open_session(&config)?;
    let essays = session.saved_essays().await?;

    match action {
        EssaysAction::List { json: true } => print_json(&essays)?,
        EssaysAction::List { json: false } => {
            if essays.is_empty() {
                println!("No saved essays.");
            }
            for essay in &essays {
                println!(
                    "{:>4}  {}  {}",
                    essay.id,
                    essay.created_at.format("%Y-%m-%d %H:%M"),
                    first_line(&essay.question, 60)
                );
            }
        }
        EssaysAction::Show { id } => {
            let essay = essays
                .iter()
                .find(|e| e.id == id)
                .ok_or_else(|| format!("saved essay not found: {id}"))?;
            print_json(essay)?;
        }
    }
    Ok(())
}

fn first_line(text: &str, max_chars: usize) -> String {
    let line = text.lines().next().unwrap_or_default();
    if line.chars().count() > max_chars {
        let cut: String = line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::first_line;

    #[test]
    fn first_line_truncates_long_questions() {
        assert_eq!(first_line("Short\nsecond", 60), "Short");
        let long = "x".repeat(80);
        let shown = first_line(&long, 10);
        assert_eq!(shown, "xxxxxxx...");
        assert_eq!(shown.chars().count(), 10);
    }
}
