use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::Result;
use crate::memory::{ConversationStore, Role, Transcript};
use colored::Colorize;
use prettytable::{format, Table};

const PREVIEW_CHARS: usize = 40;

/// Handle history commands
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let store = ConversationStore::load(&config.memory.path)?;

    match command {
        HistoryCommand::List => {
            if store.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }

            let mut table = Table::new();
            table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

            table.add_row(prettytable::row![
                "Sender".bold(),
                "Turns".bold(),
                "Last Message".bold()
            ]);

            for (sender, turns) in store.senders() {
                let last = store
                    .transcript(sender)
                    .and_then(Transcript::last)
                    .map(|turn| preview(&turn.content))
                    .unwrap_or_default();
                table.add_row(prettytable::row![sender.cyan(), turns, last]);
            }

            println!("\nConversation History ({}):", store.path().display());
            table.printstd();
            println!();
            println!(
                "Use {} to print a transcript.",
                "finbot history show <SENDER>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { sender, json } => match store.transcript(&sender) {
            None => {
                println!("{}", format!("No transcript found for {}", sender).yellow());
            }
            Some(transcript) if json => {
                println!("{}", serde_json::to_string_pretty(transcript)?);
            }
            Some(transcript) => {
                println!("{}", render_transcript(&sender, transcript));
            }
        },
    }

    Ok(())
}

/// Human-readable view of one transcript
pub fn render_transcript(sender: &str, transcript: &Transcript) -> String {
    let mut out = format!("Transcript for {} ({} turns)\n", sender.bold(), transcript.len());
    for turn in transcript.iter() {
        let label = match turn.role {
            Role::Human => "human".green(),
            Role::Ai => "ai".blue(),
        };
        out.push_str(&format!("\n[{}] {}", label, turn.content));
    }
    out
}

/// First characters of a message on a single line
fn preview(content: &str) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() > PREVIEW_CHARS {
        let head: String = flat.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{}...", head)
    } else {
        flat
    }
}
