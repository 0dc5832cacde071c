//! Error types for Bharat AI
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.
//!
//! Provider failures that the user is expected to see (overload, quota,
//! safety, ...) are *not* errors at the provider boundary; they are returned
//! as [`ChatOutcome::Failure`](crate::providers::ChatOutcome). The variants
//! below cover everything else.

use thiserror::Error;

/// Main error type for Bharat AI operations
///
/// This enum encompasses all errors that can occur while loading
/// configuration, talking to providers, persisting conversations,
/// and driving client-side chat sessions.
#[derive(Error, Debug)]
pub enum BharatError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Provider-related errors (API calls, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Missing credentials for provider
    #[error("Missing credentials for provider: {0}")]
    MissingCredentials(String),

    /// Request failed validation before any work was done
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Conversation does not exist
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    /// A chat session operation was attempted in the wrong state
    #[error("Session busy: {0}")]
    SessionBusy(String),

    /// Remote chat API returned an error status
    #[error("Chat API error: status={status}, {message}")]
    ChatApi {
        /// HTTP status returned by the API
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Conversation storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for Bharat AI operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
