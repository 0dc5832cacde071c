//! Test utilities for Bharat AI
//!
//! This module provides common test utilities including temporary directory
//! management, a scripted response backend and assertion helpers.

use crate::config::Config;
use crate::error::BharatError;
use crate::providers::retry::RetryPolicy;
use crate::providers::{
    BackendError, ChatBackend, ChatRequest, Completion, ImageData, TokenUsage,
};
use async_trait::async_trait;
use std::sync::Mutex;
use tempfile::TempDir;

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Backend that answers from a fixed script
///
/// Chat replies are consumed in order; once the script is exhausted every
/// call fails with a 500. Records the history length of each chat request.
pub struct ScriptedBackend {
    chat: Mutex<Vec<Result<Completion, BackendError>>>,
    title: Result<String, BackendError>,
    seen_history: Mutex<Vec<usize>>,
}

impl ScriptedBackend {
    /// Backend that replies with each text in turn
    pub fn replying(replies: &[&str]) -> Self {
        Self::scripted(
            replies
                .iter()
                .map(|text| {
                    Ok(Completion {
                        text: text.to_string(),
                        usage: TokenUsage::default(),
                    })
                })
                .collect(),
        )
    }

    /// Backend whose every chat call fails with `error`
    pub fn failing(error: BackendError) -> Self {
        Self::scripted(vec![Err(error)])
    }

    fn scripted(chat: Vec<Result<Completion, BackendError>>) -> Self {
        Self {
            chat: Mutex::new(chat.into_iter().rev().collect()),
            title: Ok(String::new()),
            seen_history: Mutex::new(Vec::new()),
        }
    }

    /// Set the raw title reply
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Ok(title.to_string());
        self
    }

    /// History lengths seen by chat calls so far
    pub fn seen_history(&self) -> Vec<usize> {
        self.seen_history.lock().expect("history lock").clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn retry_policy(&self) -> RetryPolicy<BackendError> {
        RetryPolicy::never()
    }

    async fn complete_chat(&self, request: &ChatRequest) -> Result<Completion, BackendError> {
        self.seen_history
            .lock()
            .expect("history lock")
            .push(request.history.len());
        self.chat
            .lock()
            .expect("script lock")
            .pop()
            .unwrap_or_else(|| Err(BackendError::status(500, "script exhausted")))
    }

    async fn complete_title(&self, _first_message: &str) -> Result<String, BackendError> {
        self.title.clone()
    }

    async fn describe_image(
        &self,
        _image: &ImageData,
        _prompt: Option<&str>,
    ) -> Result<String, BackendError> {
        Ok("an image".to_string())
    }
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: Result<T, BharatError>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

/// Create a test configuration YAML string
pub fn test_config_yaml() -> String {
    r#"
provider:
  type: webhook
  webhook:
    url: https://hooks.example.com/webhook/bharat
    chat_timeout_seconds: 30
    title_timeout_seconds: 5
    retry:
      max_retries: 2
      base_delay_ms: 500

server:
  bind_addr: 127.0.0.1:9000

notify:
  poll_interval_seconds: 30
"#
    .to_string()
}

/// Parse [`test_config_yaml`]
pub fn test_config() -> Config {
    serde_yaml::from_str(&test_config_yaml()).expect("test config parses")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: Result<(), BharatError> =
            Err(BharatError::Config("test error message".to_string()));
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: Result<(), BharatError> =
            Err(BharatError::Config("different error".to_string()));
        assert_error_contains(result, "not present");
    }

    #[test]
    fn test_test_config_is_valid() {
        let config = test_config();
        assert_eq!(config.provider.provider_type, "webhook");
        assert_eq!(config.provider.webhook.retry.max_retries, 2);
        assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_scripted_backend_exhausts() {
        let backend = ScriptedBackend::replying(&["one"]);
        let request = ChatRequest {
            message: "hi".to_string(),
            history: Vec::new(),
            image: None,
        };
        assert_eq!(backend.complete_chat(&request).await.unwrap().text, "one");
        let err = backend.complete_chat(&request).await.unwrap_err();
        assert_eq!(err.status, Some(500));
        assert_eq!(backend.seen_history(), vec![0, 0]);
    }
}
