//! Special commands parser for interactive chat mode
//!
//! This module parses the `/` commands available in the chat REPL:
//! - Toggle image-generation mode or attach an image
//! - Start, list, open and delete conversations
//! - Show status and help
//! - Exit the session
//!
//! Commands are case-insensitive; arguments keep their case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Where `/open` and `/delete` point
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationRef {
    /// 1-based position in the last `/list` output
    Index(usize),
    /// Conversation id
    Id(String),
}

impl ConversationRef {
    fn parse(arg: &str) -> Self {
        match arg.parse::<usize>() {
            Ok(index) if index > 0 => Self::Index(index),
            _ => Self::Id(arg.to_string()),
        }
    }
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Toggle image-generation mode for the next message
    ToggleImageMode,

    /// Attach an image file to the next message
    Attach(PathBuf),

    /// Drop the pending attachment
    Detach,

    /// Start a new conversation
    NewChat,

    /// List conversations
    List,

    /// Open a conversation
    Open(ConversationRef),

    /// Delete a conversation (asks for confirmation)
    Delete(ConversationRef),

    /// Show session status
    ShowStatus,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; send as a message
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns `CommandError::UnknownCommand` for unrecognized `/` commands and
/// `CommandError::MissingArgument` when a command needs an argument
///
/// # Examples
///
/// ```
/// use bharat_ai::commands::special_commands::{
///     parse_special_command, ConversationRef, SpecialCommand,
/// };
///
/// assert_eq!(parse_special_command("/image").unwrap(), SpecialCommand::ToggleImageMode);
/// assert_eq!(
///     parse_special_command("/open 2").unwrap(),
///     SpecialCommand::Open(ConversationRef::Index(2))
/// );
/// assert_eq!(parse_special_command("Namaste").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    let (command, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((command, arg)) => (command.to_lowercase(), arg.trim()),
        None => (lower.clone(), ""),
    };

    match command.as_str() {
        "/image" | "/imagine" => Ok(SpecialCommand::ToggleImageMode),
        "/attach" => {
            let path = require(&command, arg, "/attach <path>")?;
            Ok(SpecialCommand::Attach(PathBuf::from(path)))
        }
        "/detach" => Ok(SpecialCommand::Detach),
        "/new" => Ok(SpecialCommand::NewChat),
        "/list" | "/chats" => Ok(SpecialCommand::List),
        "/open" => {
            let target = require(&command, arg, "/open <number|id>")?;
            Ok(SpecialCommand::Open(ConversationRef::parse(target)))
        }
        "/delete" => {
            let target = require(&command, arg, "/delete <number|id>")?;
            Ok(SpecialCommand::Delete(ConversationRef::parse(target)))
        }
        "/status" => Ok(SpecialCommand::ShowStatus),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/quit" | "/exit" | "exit" | "quit" => Ok(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(command.clone())),
    }
}

fn require<'a>(command: &str, arg: &'a str, usage: &str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument {
            command: command.to_string(),
            usage: usage.to_string(),
        })
    } else {
        Ok(arg)
    }
}

/// Print help for the chat REPL
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat
=====================================

IMAGES:
  /image          - Toggle image generation for the next message
  /attach <path>  - Attach an image to the next message
  /detach         - Drop the pending attachment

CONVERSATIONS:
  /new            - Start a new conversation
  /list           - List conversations, newest first
  /open <n|id>    - Open a conversation by list number or id
  /delete <n|id>  - Delete a conversation (asks for confirmation)

SESSION:
  /status         - Show the current conversation and mode
  /help           - Show this help
  /quit, exit     - Leave the chat
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_not_a_command() {
        assert_eq!(
            parse_special_command("What is the capital of France?").unwrap(),
            SpecialCommand::None
        );
    }

    #[test]
    fn test_exit_aliases() {
        for input in ["exit", "QUIT", "/quit", "/exit"] {
            assert_eq!(parse_special_command(input).unwrap(), SpecialCommand::Exit);
        }
    }

    #[test]
    fn test_attach_keeps_path_case() {
        assert_eq!(
            parse_special_command("/ATTACH ./Photos/Taj.PNG").unwrap(),
            SpecialCommand::Attach(PathBuf::from("./Photos/Taj.PNG"))
        );
    }

    #[test]
    fn test_open_by_id_or_index() {
        assert_eq!(
            parse_special_command("/open 3").unwrap(),
            SpecialCommand::Open(ConversationRef::Index(3))
        );
        assert_eq!(
            parse_special_command("/open 9f1c-abc").unwrap(),
            SpecialCommand::Open(ConversationRef::Id("9f1c-abc".to_string()))
        );
        assert_eq!(
            parse_special_command("/delete 0").unwrap(),
            SpecialCommand::Delete(ConversationRef::Id("0".to_string()))
        );
    }

    #[test]
    fn test_missing_argument() {
        let err = parse_special_command("/open").unwrap_err();
        assert!(matches!(err, CommandError::MissingArgument { .. }));
        assert!(err.to_string().contains("/open <number|id>"));
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_special_command("/mode write").unwrap_err(),
            CommandError::UnknownCommand("/mode".to_string())
        );
    }
}
