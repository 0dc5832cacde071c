//! Bharat AI - chat assistant server and client library
//!
//! This library provides the chat API server, the provider layer that
//! talks to Gemini or a webhook relay, conversation storage, and the
//! client-side session, store and update notification logic.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `providers`: Response backends, error classification and retries
//! - `prompts`: Persona and task prompts sent to the backends
//! - `storage`: SQLite conversation persistence
//! - `server`: HTTP chat API
//! - `client`: HTTP client for the chat API
//! - `store`: Client-side conversation index
//! - `session`: Client-side state of one conversation view
//! - `notify`: Worker update lifecycle and push notifications
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use bharat_ai::providers::create_response_service;
//! use bharat_ai::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let service = create_response_service(&config.provider)?;
//!     println!("{}", service.generate_chat_title("What is the capital of France?").await);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod models;
pub mod notify;
pub mod prompts;
pub mod providers;
pub mod server;
pub mod session;
pub mod storage;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{BharatError, Result};
pub use models::{ConversationSummary, Message, Role};

#[cfg(test)]
pub mod test_utils;
