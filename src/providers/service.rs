//! Backend-agnostic response service
//!
//! [`ResponseService`] wraps any [`ChatBackend`] and adds what callers rely
//! on regardless of backend: the history window, overload retries, error
//! classification into user-facing text, title fallbacks and the image
//! analysis apology.

use crate::models::Message;
use crate::providers::base::{
    ChatBackend, ChatFailure, ChatOutcome, ChatRequest, ChatSuccess, ChatTurn, ImageAnalysis,
    ImageData,
};
use crate::providers::classify::classify;
use crate::providers::retry::retry_with_backoff;
use regex::Regex;
use std::sync::{Arc, OnceLock};

/// Number of trailing history messages forwarded as context
pub const HISTORY_WINDOW: usize = 10;

/// Maximum title length in characters
pub const TITLE_MAX_CHARS: usize = 50;

/// Returned by [`ResponseService::analyze_image`] when the backend fails
pub const IMAGE_ANALYSIS_APOLOGY: &str =
    "I'm unable to analyze this image at the moment. Please try again later.";

const TITLE_LONG_PREFIX: usize = 47;
const TITLE_SHORT_PREFIX: usize = 30;
const ELLIPSIS: &str = "...";

/// Stateless response generation on top of a backend
///
/// Cheap to clone; safe to share across concurrent requests for unrelated
/// conversations.
#[derive(Clone)]
pub struct ResponseService {
    backend: Arc<dyn ChatBackend>,
}

impl ResponseService {
    /// Wrap a backend
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    /// Name of the wrapped backend
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Generate a chat reply
    ///
    /// Only the last [`HISTORY_WINDOW`] history messages are forwarded.
    /// Overload failures are retried under the backend's policy; every other
    /// failure returns immediately. Never returns an error: failures come
    /// back as [`ChatOutcome::Failure`] with a user-facing message.
    ///
    /// # Arguments
    ///
    /// * `message` - Current user message; may be empty when `image` is set
    /// * `history` - Prior messages, oldest first
    /// * `image` - Optional attached image
    pub async fn generate_chat_response(
        &self,
        message: &str,
        history: &[Message],
        image: Option<ImageData>,
    ) -> ChatOutcome {
        let request = ChatRequest {
            message: message.to_string(),
            history: history_window(history),
            image,
        };
        let policy = self.backend.retry_policy();
        let backend = self.backend.name();

        metrics::increment_counter!("bharat_provider_requests_total", "backend" => backend);

        let result = retry_with_backoff(&policy, "chat_completion", |attempt| {
            let request = &request;
            async move {
                tracing::debug!(backend, attempt, "Requesting chat completion");
                self.backend.complete_chat(request).await
            }
        })
        .await;

        match result {
            Ok(completion) => {
                tracing::info!(
                    backend,
                    prompt_tokens = completion.usage.prompt_tokens,
                    completion_tokens = completion.usage.completion_tokens,
                    "Chat completion succeeded"
                );
                ChatOutcome::Success(ChatSuccess {
                    message: completion.text.trim().to_string(),
                    usage: completion.usage,
                })
            }
            Err(err) => {
                let error_type = classify(&err);
                tracing::error!(backend, error_type = %error_type, "Chat completion failed: {}", err);
                metrics::increment_counter!(
                    "bharat_provider_failures_total",
                    "backend" => backend,
                    "error_type" => error_type.as_str()
                );
                ChatOutcome::Failure(ChatFailure {
                    message: error_type.user_message().to_string(),
                    error: err.detail,
                    error_type,
                })
            }
        }
    }

    /// Generate a conversation title from the first user message
    ///
    /// A single call, never retried. The result never exceeds
    /// [`TITLE_MAX_CHARS`] characters.
    pub async fn generate_chat_title(&self, first_message: &str) -> String {
        match self.backend.complete_title(first_message).await {
            Ok(reply) => finalize_title(&reply, first_message),
            Err(err) => {
                tracing::warn!(backend = self.backend.name(), "Title generation failed: {}", err);
                title_on_failure(first_message)
            }
        }
    }

    /// Analyze an image, optionally answering a question about it
    ///
    /// A single call, never retried. Failures return
    /// [`IMAGE_ANALYSIS_APOLOGY`] with `success: false`.
    pub async fn analyze_image(&self, image: &ImageData, prompt: Option<&str>) -> ImageAnalysis {
        match self.backend.describe_image(image, prompt).await {
            Ok(analysis) => ImageAnalysis {
                success: true,
                analysis: analysis.trim().to_string(),
                error: None,
            },
            Err(err) => {
                tracing::error!(backend = self.backend.name(), "Image analysis failed: {}", err);
                ImageAnalysis {
                    success: false,
                    analysis: IMAGE_ANALYSIS_APOLOGY.to_string(),
                    error: Some(err.detail),
                }
            }
        }
    }
}

/// Map the trailing history window to backend turns
pub fn history_window(history: &[Message]) -> Vec<ChatTurn> {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..].iter().map(ChatTurn::from).collect()
}

fn quote_pattern() -> Option<&'static Regex> {
    static QUOTES: OnceLock<Option<Regex>> = OnceLock::new();
    QUOTES.get_or_init(|| Regex::new(r#"['"]"#).ok()).as_ref()
}

fn prefix(text: &str, chars: usize) -> String {
    text.chars().take(chars).collect()
}

/// Turn a raw title reply into the final title
///
/// The reply is trimmed and stripped of quotes. An empty or over-long reply
/// becomes the first 47 characters of `first_message` plus an ellipsis.
///
/// # Examples
///
/// ```
/// use bharat_ai::providers::service::finalize_title;
///
/// assert_eq!(finalize_title("\"Capital of France\"", "What is the capital of France?"), "Capital of France");
/// assert_eq!(finalize_title("", "Hello"), "Hello...");
/// ```
pub fn finalize_title(reply: &str, first_message: &str) -> String {
    let trimmed = reply.trim();
    let title = match quote_pattern() {
        Some(quotes) => quotes.replace_all(trimmed, "").trim().to_string(),
        None => trimmed.to_string(),
    };
    if title.is_empty() || title.chars().count() > TITLE_MAX_CHARS {
        return format!("{}{}", prefix(first_message, TITLE_LONG_PREFIX), ELLIPSIS);
    }
    title
}

/// Title used when the title call itself failed
///
/// # Examples
///
/// ```
/// use bharat_ai::providers::service::title_on_failure;
///
/// assert_eq!(title_on_failure("Short question"), "Short question");
/// assert_eq!(
///     title_on_failure("Explain the history of the Maratha empire in detail"),
///     "Explain the history of the Mar..."
/// );
/// ```
pub fn title_on_failure(first_message: &str) -> String {
    if first_message.chars().count() > TITLE_SHORT_PREFIX {
        format!("{}{}", prefix(first_message, TITLE_SHORT_PREFIX), ELLIPSIS)
    } else {
        first_message.to_string()
    }
}
