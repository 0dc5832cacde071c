//! Chat domain and wire types
//!
//! These types are shared by the HTTP server, the HTTP client, the
//! client-side session and the conversation store. Field names serialize in
//! camelCase to match the JSON the web front end already speaks.

use crate::providers::ErrorType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix that marks a message id as client-side and not yet confirmed
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Maximum characters of the assistant reply kept as a conversation preview
pub const PREVIEW_MAX_CHARS: usize = 100;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Convert role to string representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Image attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRef {
    /// Where the image can be fetched (http(s) or `data:` URL)
    pub url: String,
    /// MIME type of the image
    pub mime_type: String,
}

/// A single chat message
///
/// Messages created on the client before the server confirmed them carry a
/// [`TEMP_ID_PREFIX`] id and a client-side timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique identifier
    pub id: String,
    /// Sender role
    pub role: Role,
    /// Text content; may be empty when an image is attached
    #[serde(default)]
    pub content: String,
    /// Optional attached image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Creates a confirmed message with a fresh id
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::models::{Message, Role};
    ///
    /// let msg = Message::new(Role::User, "Namaste");
    /// assert_eq!(msg.role, Role::User);
    /// assert!(!msg.is_temporary());
    /// ```
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            image: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates an optimistic message that has not been confirmed yet
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::models::{Message, Role};
    ///
    /// let msg = Message::temporary(Role::User, "Hello", None);
    /// assert!(msg.is_temporary());
    /// assert!(msg.id.starts_with("temp-"));
    /// ```
    pub fn temporary(role: Role, content: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self {
            id: format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4()),
            role,
            content: content.into(),
            image,
            timestamp: Utc::now(),
        }
    }

    /// Attach an image
    pub fn with_image(mut self, image: Option<ImageRef>) -> Self {
        self.image = image;
        self
    }

    /// Whether this message is an unconfirmed client-side placeholder
    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }
}

/// Lightweight metadata about a conversation shown in a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Conversation identifier
    pub id: String,
    /// Title generated from the first user message
    pub title: String,
    /// Number of messages; always even
    pub message_count: usize,
    /// Bounded prefix of the latest assistant reply
    #[serde(default)]
    pub last_message_preview: String,
    /// When the conversation was created
    pub created_at: DateTime<Utc>,
    /// When the last exchange completed
    pub updated_at: DateTime<Utc>,
}

/// Returns the first [`PREVIEW_MAX_CHARS`] characters of `text`
///
/// # Examples
///
/// ```
/// use bharat_ai::models::preview_of;
///
/// assert_eq!(preview_of("Paris is the capital of France."), "Paris is the capital of France.");
/// assert_eq!(preview_of(&"a".repeat(300)).chars().count(), 100);
/// ```
pub fn preview_of(text: &str) -> String {
    text.chars().take(PREVIEW_MAX_CHARS).collect()
}

/// Base64 image payload sent with a chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    /// Base64-encoded image bytes
    pub data: String,
    /// MIME type of the image
    pub mime_type: String,
}

impl InlineImage {
    /// Render as a `data:` URL for storage on the message
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Body of `POST /chats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Message text
    #[serde(default)]
    pub message: String,
    /// Existing conversation; absent when starting a new one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    /// Uploaded image for analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<InlineImage>,
    /// Image produced by `/generate-image` for this prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image_url: Option<String>,
}

/// Response of `POST /chats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub chat_id: String,
    pub chat_title: String,
    pub is_new_chat: bool,
    pub user_message: Message,
    pub assistant_message: Message,
    /// Server-side `updatedAt` of the conversation after this exchange
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response of `GET /chats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatListResponse {
    pub chats: Vec<ConversationSummary>,
}

/// Full conversation as returned by `GET /chats/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDetail {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub messages: Vec<Message>,
}

/// Response of `GET /chats/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatDetailResponse {
    pub chat: ChatDetail,
}

/// Response of `DELETE /chats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
}

/// Body of `POST /generate-image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateImageRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Image returned by `POST /generate-image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
}

/// Response of `POST /generate-image`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateImageResponse {
    pub image: GeneratedImage,
}

/// Error body returned by every route
///
/// For provider failures `message` holds the user-facing text and `error`
/// holds the raw diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
