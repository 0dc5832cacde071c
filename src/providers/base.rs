//! Base backend trait and common types for Bharat AI providers
//!
//! This module defines the [`ChatBackend`] trait that every response backend
//! implements (direct Gemini API, webhook relay), along with the request,
//! completion and outcome types shared by the provider layer.

use crate::models::{Message, Role};
use crate::providers::classify::ErrorType;
use crate::providers::retry::RetryPolicy;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token usage information from a completion
///
/// Tracks the number of tokens used in prompts and completions,
/// as reported by the provider. Fields stay zero when the provider
/// does not report them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    #[serde(default)]
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    #[serde(default)]
    pub completion_tokens: usize,
    /// Total tokens used
    #[serde(default)]
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50, 150);
    /// assert_eq!(usage.total_tokens, 150);
    /// assert_eq!(TokenUsage::default().total_tokens, 0);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize, total_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

/// Binary image payload passed to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// Raw image bytes
    pub bytes: Bytes,
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
}

impl ImageData {
    /// Create a new image payload
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// Decode an image from base64 text
    ///
    /// # Errors
    ///
    /// Returns an error when `data` is not valid standard base64
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::providers::ImageData;
    ///
    /// let image = ImageData::from_base64("aGk=", "image/png").unwrap();
    /// assert_eq!(&image.bytes[..], b"hi");
    /// ```
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> crate::error::Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| {
                crate::error::BharatError::InvalidRequest(format!("Invalid image data: {}", e))
            })?;
        Ok(Self::new(bytes, mime_type))
    }

    /// Encode the bytes as standard base64
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

/// Detect an image MIME type from its leading bytes
///
/// # Examples
///
/// ```
/// use bharat_ai::providers::base::sniff_mime_type;
///
/// let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
/// assert_eq!(sniff_mime_type(&png), Some("image/png"));
/// assert_eq!(sniff_mime_type(b"plain text"), None);
/// ```
pub fn sniff_mime_type(bytes: &[u8]) -> Option<&'static str> {
    image::guess_format(bytes)
        .ok()
        .map(|format| format.to_mime_type())
}

/// One prior turn forwarded as context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Sender role
    pub role: Role,
    /// Text content
    pub content: String,
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A chat completion request as seen by a backend
///
/// The history has already been cut down to the context window.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Current user message
    pub message: String,
    /// Trailing history, oldest first
    pub history: Vec<ChatTurn>,
    /// Optional image attached to the current message
    pub image: Option<ImageData>,
}

/// Successful backend completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Reply text, untrimmed
    pub text: String,
    /// Reported usage, zeros when absent
    pub usage: TokenUsage,
}

/// Coarse transport-level category of a backend failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// Non-success HTTP status
    Status,
    /// Request exceeded its deadline
    Timeout,
    /// Connection could not be established
    Connect,
    /// Provider refused the content
    Blocked,
    /// Response did not have a recognizable shape
    Malformed,
    /// Anything else
    Other,
}

/// Raw failure reported by a backend
///
/// Carries enough detail for classification and for logs. The `detail`
/// string is diagnostic text and must never be shown to end users as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    /// Transport-level category
    pub kind: BackendErrorKind,
    /// HTTP status when one was received
    pub status: Option<u16>,
    /// Raw diagnostic text
    pub detail: String,
}

impl BackendError {
    /// Failure caused by a non-success HTTP status
    pub fn status(status: u16, detail: impl Into<String>) -> Self {
        Self {
            kind: BackendErrorKind::Status,
            status: Some(status),
            detail: detail.into(),
        }
    }

    /// Failure of the given kind without a status
    pub fn new(kind: BackendErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            detail: detail.into(),
        }
    }

    /// Map a transport error from `reqwest`
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            BackendErrorKind::Timeout
        } else if err.is_connect() {
            BackendErrorKind::Connect
        } else if err.is_decode() {
            BackendErrorKind::Malformed
        } else {
            BackendErrorKind::Other
        };
        let detail = match kind {
            BackendErrorKind::Timeout => format!("request timeout: {}", err),
            BackendErrorKind::Connect => format!("network error: {}", err),
            _ => err.to_string(),
        };
        Self {
            kind,
            status: err.status().map(|s| s.as_u16()),
            detail,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.detail)
    }
}

impl std::error::Error for BackendError {}

/// Backend trait for response providers
///
/// A backend performs exactly one upstream call per method invocation.
/// Retries, history windowing, error classification and title fallbacks
/// live in [`ResponseService`](crate::providers::ResponseService) so they
/// behave identically for every backend.
///
/// # Examples
///
/// ```no_run
/// use bharat_ai::providers::{BackendError, ChatBackend, ChatRequest, Completion, ImageData, TokenUsage};
/// use bharat_ai::providers::retry::RetryPolicy;
/// use async_trait::async_trait;
///
/// struct EchoBackend;
///
/// #[async_trait]
/// impl ChatBackend for EchoBackend {
///     fn name(&self) -> &'static str {
///         "echo"
///     }
///
///     fn retry_policy(&self) -> RetryPolicy<BackendError> {
///         RetryPolicy::overload_default()
///     }
///
///     async fn complete_chat(&self, request: &ChatRequest) -> Result<Completion, BackendError> {
///         Ok(Completion { text: request.message.clone(), usage: TokenUsage::default() })
///     }
///
///     async fn complete_title(&self, first_message: &str) -> Result<String, BackendError> {
///         Ok(first_message.to_string())
///     }
///
///     async fn describe_image(
///         &self,
///         _image: &ImageData,
///         _prompt: Option<&str>,
///     ) -> Result<String, BackendError> {
///         Ok("an image".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Short backend name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Retry policy applied to chat completions
    fn retry_policy(&self) -> RetryPolicy<BackendError>;

    /// Produce a chat reply for the request
    ///
    /// # Errors
    ///
    /// Returns the raw backend failure; callers classify it
    async fn complete_chat(&self, request: &ChatRequest) -> Result<Completion, BackendError>;

    /// Ask the backend for a short conversation title
    ///
    /// Returns the raw reply; an empty string means the backend answered
    /// without a usable title.
    async fn complete_title(&self, first_message: &str) -> Result<String, BackendError>;

    /// Describe or answer a question about an image
    async fn describe_image(
        &self,
        image: &ImageData,
        prompt: Option<&str>,
    ) -> Result<String, BackendError>;
}

/// Successful chat outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSuccess {
    /// Trimmed reply text
    pub message: String,
    /// Token usage, zeros when unreported
    pub usage: TokenUsage,
}

/// Failed chat outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatFailure {
    /// User-facing message for the error category
    pub message: String,
    /// Raw diagnostic, for logs only
    pub error: String,
    /// Error category
    pub error_type: ErrorType,
}

/// Result of `generate_chat_response`
///
/// Expected failures are values, not errors: the provider layer never
/// returns `Err` for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    Success(ChatSuccess),
    Failure(ChatFailure),
}

impl ChatOutcome {
    /// Whether the call succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Reply text on success, user-facing error text on failure
    pub fn message(&self) -> &str {
        match self {
            Self::Success(s) => &s.message,
            Self::Failure(f) => &f.message,
        }
    }

    /// Error category on failure
    pub fn error_type(&self) -> Option<ErrorType> {
        match self {
            Self::Success(_) => None,
            Self::Failure(f) => Some(f.error_type),
        }
    }
}

impl Serialize for ChatOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Shape<'a> {
            success: bool,
            message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            usage: Option<&'a TokenUsage>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error: Option<&'a str>,
            #[serde(skip_serializing_if = "Option::is_none")]
            error_type: Option<ErrorType>,
        }

        let shape = match self {
            Self::Success(s) => Shape {
                success: true,
                message: &s.message,
                usage: Some(&s.usage),
                error: None,
                error_type: None,
            },
            Self::Failure(f) => Shape {
                success: false,
                message: &f.message,
                usage: None,
                error: Some(&f.error),
                error_type: Some(f.error_type),
            },
        };
        shape.serialize(serializer)
    }
}

/// Result of `analyze_image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    /// Whether the backend produced an analysis
    pub success: bool,
    /// Analysis text, or a fixed apology on failure
    pub analysis: String,
    /// Raw diagnostic on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
