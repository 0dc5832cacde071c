//! Command-line interface definition for Bharat AI
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for the API server, the chat client, conversation
//! history and one-shot provider calls.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bharat AI - chat assistant server and client
#[derive(Parser, Debug, Clone)]
#[command(name = "bharat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Chat API base URL used by client commands
    #[arg(long, env = "BHARAT_API_URL")]
    pub api_url: Option<String>,

    /// Conversation database path used by the server and `history`
    #[arg(long, env = "BHARAT_HISTORY_DB")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for Bharat AI
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the chat API server
    Serve {
        /// Address to bind, overrides `server.bind_addr`
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Start an interactive chat against the API server
    Chat {
        /// Open an existing conversation
        #[arg(short, long)]
        resume: Option<String>,

        /// Send this message first, once
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Manage stored conversations
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Generate a title for a first message using the configured provider
    Title {
        /// First user message
        message: String,
    },

    /// Describe an image using the configured provider
    Analyze {
        /// Image file
        image: PathBuf,

        /// Question about the image
        #[arg(short, long)]
        prompt: Option<String>,
    },

    /// Watch the worker script for new versions
    WatchUpdates {
        /// Script URL, overrides `notify.script_url`
        #[arg(long)]
        script_url: Option<String>,

        /// Poll interval in seconds, overrides `notify.poll_interval_seconds`
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show the notification a push payload would produce
    PushPreview {
        /// Push body (JSON); read from stdin when omitted
        payload: Option<String>,
    },
}

/// History management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommand {
    /// List stored conversations, newest first
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show the messages of a conversation
    Show {
        /// Conversation id
        id: String,
    },

    /// Delete a stored conversation
    Delete {
        /// Conversation id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            json_logs: false,
            api_url: None,
            storage_path: None,
            command: Commands::History {
                command: HistoryCommand::List { json: false },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/config.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(cli.api_url.is_none());
    }

    #[test]
    fn test_cli_parse_serve_with_bind() {
        let cli = Cli::try_parse_from(["bharat", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        if let Commands::Serve { bind } = cli.command {
            assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
        } else {
            panic!("Expected Serve command");
        }
    }

    #[test]
    fn test_cli_parse_chat_resume_and_message() {
        let cli = Cli::try_parse_from([
            "bharat", "chat", "--resume", "c1", "--message", "Namaste",
        ])
        .unwrap();
        if let Commands::Chat { resume, message } = cli.command {
            assert_eq!(resume.as_deref(), Some("c1"));
            assert_eq!(message.as_deref(), Some("Namaste"));
        } else {
            panic!("Expected Chat command");
        }
    }

    #[test]
    fn test_cli_parse_history_delete() {
        let cli = Cli::try_parse_from(["bharat", "history", "delete", "c1", "--yes"]).unwrap();
        match cli.command {
            Commands::History {
                command: HistoryCommand::Delete { id, yes },
            } => {
                assert_eq!(id, "c1");
                assert!(yes);
            }
            other => panic!("Expected history delete, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "bharat",
            "--json-logs",
            "--storage-path",
            "/tmp/chats.db",
            "--api-url",
            "http://localhost:9999",
            "history",
            "list",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.storage_path.as_deref(), Some("/tmp/chats.db"));
        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:9999"));
    }

    #[test]
    fn test_cli_parse_analyze() {
        let cli = Cli::try_parse_from(["bharat", "analyze", "cat.png", "-p", "What breed?"])
            .unwrap();
        if let Commands::Analyze { image, prompt } = cli.command {
            assert_eq!(image, PathBuf::from("cat.png"));
            assert_eq!(prompt.as_deref(), Some("What breed?"));
        } else {
            panic!("Expected Analyze command");
        }
    }

    #[test]
    fn test_cli_parse_watch_updates() {
        let cli = Cli::try_parse_from(["bharat", "watch-updates", "--interval", "30"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::WatchUpdates {
                interval: Some(30),
                ..
            }
        ));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["bharat"]).is_err());
    }
}
