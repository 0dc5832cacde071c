use crate::cli::HistoryCommand;
use crate::config::Config;
use crate::error::{BharatError, Result};
use crate::models::{ConversationSummary, Message, Role};
use crate::storage::SqliteStorage;
use colored::Colorize;
use prettytable::{format, Table};
use std::io::{self, BufRead, Write};

const TITLE_COLUMN_CHARS: usize = 40;

/// Handle history commands against the local conversation database
pub fn handle_history(config: &Config, command: HistoryCommand) -> Result<()> {
    let storage = SqliteStorage::from_config(&config.storage)?;
    tracing::debug!("Using conversation database {}", storage.db_path().display());

    match command {
        HistoryCommand::List { json } => {
            let conversations = storage.list_summaries()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&conversations)?);
                return Ok(());
            }
            if conversations.is_empty() {
                println!("{}", "No conversation history found.".yellow());
                return Ok(());
            }
            print_summary_table(&conversations);
            println!(
                "Use {} to continue a conversation.",
                "bharat chat --resume <ID>".cyan()
            );
            println!();
        }
        HistoryCommand::Show { id } => {
            let stored = storage
                .load_conversation(&id)?
                .ok_or_else(|| BharatError::ConversationNotFound(id.clone()))?;
            println!("\n{}", stored.summary.title.bold());
            for message in &stored.messages {
                print_message(message);
            }
            println!();
        }
        HistoryCommand::Delete { id, yes } => {
            let stored = storage
                .load_conversation(&id)?
                .ok_or_else(|| BharatError::ConversationNotFound(id.clone()))?;
            if !yes && !confirm(&format!("Delete '{}'?", stored.summary.title))? {
                println!("{}", "Deletion cancelled.".yellow());
                return Ok(());
            }
            storage.delete_conversation(&id)?;
            println!("{}", format!("Deleted conversation {}", id).green());
        }
    }

    Ok(())
}

/// Print conversations as a table, numbered from 1
pub fn print_summary_table(conversations: &[ConversationSummary]) {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);

    table.add_row(prettytable::row![
        "#".bold(),
        "ID".bold(),
        "Title".bold(),
        "Messages".bold(),
        "Last Updated".bold()
    ]);

    for (index, conversation) in conversations.iter().enumerate() {
        let id_short: String = conversation.id.chars().take(8).collect();
        let title = if conversation.title.chars().count() > TITLE_COLUMN_CHARS {
            let head: String = conversation
                .title
                .chars()
                .take(TITLE_COLUMN_CHARS - 3)
                .collect();
            format!("{}...", head)
        } else {
            conversation.title.clone()
        };
        let updated = conversation.updated_at.format("%Y-%m-%d %H:%M").to_string();

        table.add_row(prettytable::row![
            index + 1,
            id_short.cyan(),
            title,
            conversation.message_count,
            updated
        ]);
    }

    println!("\nConversations:");
    table.printstd();
    println!();
}

/// Print one message with a colored role tag
pub fn print_message(message: &Message) {
    let tag = match message.role {
        Role::User => "you".blue().bold(),
        Role::Assistant => "bharat".green().bold(),
    };
    if !message.content.is_empty() {
        println!("{} {}", tag, message.content);
    } else {
        println!("{}", tag);
    }
    if let Some(image) = &message.image {
        let shown = if image.url.starts_with("data:") {
            format!("inline {}", image.mime_type)
        } else {
            image.url.clone()
        };
        println!("    {} {}", "[image]".magenta(), shown);
    }
}

/// Ask a yes/no question on stdin; anything but y/yes declines
pub fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

pub(crate) fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_dir;

    fn config_for(path: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.storage.db_path = Some(path.to_string_lossy().to_string());
        config
    }

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_delete_with_yes_removes_conversation() {
        let dir = temp_dir();
        let config = config_for(&dir.path().join("history.db"));
        let storage = SqliteStorage::from_config(&config.storage).unwrap();
        let summary = storage
            .create_conversation(
                "Capital",
                &Message::new(Role::User, "q"),
                &Message::new(Role::Assistant, "a"),
            )
            .unwrap();

        handle_history(
            &config,
            HistoryCommand::Delete {
                id: summary.id.clone(),
                yes: true,
            },
        )
        .unwrap();
        assert!(storage.load_conversation(&summary.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let dir = temp_dir();
        let config = config_for(&dir.path().join("history.db"));
        let err = handle_history(
            &config,
            HistoryCommand::Delete {
                id: "missing".to_string(),
                yes: true,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BharatError>(),
            Some(BharatError::ConversationNotFound(_))
        ));
    }
}
