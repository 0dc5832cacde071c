//! Webhook relay backend
//!
//! Posts chat payloads to an automation webhook (an n8n workflow in the
//! hosted deployment) that fronts the model. Replies come back in one of
//! several shapes; see [`shapes`](crate::providers::shapes).

use crate::config::WebhookConfig;
use crate::error::{BharatError, Result};
use crate::prompts::{relay_image_prompt, title_prompt};
use crate::providers::base::{
    BackendError, BackendErrorKind, ChatBackend, ChatRequest, ChatTurn, Completion, ImageData,
};
use crate::providers::retry::RetryPolicy;
use crate::providers::shapes::{
    parse_analysis, parse_title, parse_usage, WebhookReply, INVALID_FORMAT,
};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Returned when the relay answers an analysis request without text
const DEFAULT_ANALYSIS: &str = "Image analyzed successfully.";

/// Webhook relay backend
pub struct WebhookBackend {
    client: Client,
    config: WebhookConfig,
    url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload<'a> {
    message: &'a str,
    conversation_history: Vec<HistoryEntry<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<ImagePayload>,
}

#[derive(Debug, Serialize)]
struct HistoryEntry<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImagePayload {
    data: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
struct AnalyzePayload {
    action: &'static str,
    image: ImagePayload,
    prompt: String,
}

impl From<&ImageData> for ImagePayload {
    fn from(image: &ImageData) -> Self {
        Self {
            data: image.to_base64(),
            mime_type: image.mime_type.clone(),
        }
    }
}

impl<'a> From<&'a ChatTurn> for HistoryEntry<'a> {
    fn from(turn: &'a ChatTurn) -> Self {
        Self {
            role: turn.role.as_str(),
            content: &turn.content,
        }
    }
}

impl WebhookBackend {
    /// Create a new webhook backend
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when no webhook URL is configured
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::config::WebhookConfig;
    /// use bharat_ai::providers::WebhookBackend;
    ///
    /// assert!(WebhookBackend::new(WebhookConfig::default()).is_err());
    ///
    /// let config = WebhookConfig {
    ///     url: Some("https://hooks.example.com/bharat".to_string()),
    ///     ..WebhookConfig::default()
    /// };
    /// assert!(WebhookBackend::new(config).is_ok());
    /// ```
    pub fn new(config: WebhookConfig) -> Result<Self> {
        let url = config
            .url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| BharatError::MissingCredentials("webhook (N8N_WEBHOOK_URL)".to_string()))?;

        let client = Client::builder()
            .user_agent(concat!("bharat-ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BharatError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized webhook backend: url={}, chat_timeout={}s",
            url,
            config.chat_timeout_seconds
        );

        Ok(Self {
            client,
            config,
            url,
        })
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        payload: &T,
        timeout: Duration,
    ) -> std::result::Result<reqwest::Response, BackendError> {
        let mut request = self.client.post(&self.url).timeout(timeout).json(payload);
        if let Some(secret) = self.config.secret.as_deref().filter(|s| !s.is_empty()) {
            request = request.bearer_auth(secret);
        }
        request.send().await.map_err(|e| {
            tracing::error!("Webhook request failed: {}", e);
            BackendError::from_reqwest(&e)
        })
    }

    async fn read_json(response: reqwest::Response) -> std::result::Result<Value, BackendError> {
        response.json::<Value>().await.map_err(|e| {
            tracing::error!("Failed to parse webhook response: {}", e);
            BackendError::new(
                BackendErrorKind::Malformed,
                format!("Failed to parse webhook response: {}", e),
            )
        })
    }
}

#[async_trait]
impl ChatBackend for WebhookBackend {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn retry_policy(&self) -> RetryPolicy<BackendError> {
        RetryPolicy::from_config(&self.config.retry)
    }

    async fn complete_chat(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<Completion, BackendError> {
        let payload = ChatPayload {
            message: &request.message,
            conversation_history: request.history.iter().map(HistoryEntry::from).collect(),
            timestamp: Some(Utc::now().to_rfc3339()),
            image: request.image.as_ref().map(ImagePayload::from),
        };

        tracing::debug!(
            "Sending webhook request: {} history messages, image={}",
            payload.conversation_history.len(),
            payload.image.is_some()
        );

        let response = self
            .post(
                &payload,
                Duration::from_secs(self.config.chat_timeout_seconds),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Webhook returned error {}: {}", status, error_text);
            return Err(BackendError::status(
                status.as_u16(),
                format!("Webhook error: {} - {}", status.as_u16(), error_text),
            ));
        }

        let body = Self::read_json(response).await?;
        let usage = parse_usage(&body);
        let reply = WebhookReply::parse(&body)
            .ok_or_else(|| BackendError::new(BackendErrorKind::Malformed, INVALID_FORMAT))?;

        Ok(Completion {
            text: reply.into_text(),
            usage,
        })
    }

    async fn complete_title(
        &self,
        first_message: &str,
    ) -> std::result::Result<String, BackendError> {
        let prompt = title_prompt(first_message);
        let payload = ChatPayload {
            message: &prompt,
            conversation_history: Vec::new(),
            timestamp: None,
            image: None,
        };

        let response = self
            .post(
                &payload,
                Duration::from_secs(self.config.title_timeout_seconds),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::status(
                status.as_u16(),
                format!("Title generation failed: {}", status.as_u16()),
            ));
        }

        let body = Self::read_json(response).await?;
        Ok(parse_title(&body))
    }

    async fn describe_image(
        &self,
        image: &ImageData,
        prompt: Option<&str>,
    ) -> std::result::Result<String, BackendError> {
        let payload = AnalyzePayload {
            action: "analyze_image",
            image: ImagePayload::from(image),
            prompt: relay_image_prompt(prompt),
        };

        let response = self
            .post(
                &payload,
                Duration::from_secs(self.config.chat_timeout_seconds),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::status(
                status.as_u16(),
                format!("Image analysis failed: {}", status.as_u16()),
            ));
        }

        let body = Self::read_json(response).await?;
        Ok(parse_analysis(&body).unwrap_or_else(|| DEFAULT_ANALYSIS.to_string()))
    }
}
