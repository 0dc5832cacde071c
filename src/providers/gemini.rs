//! Gemini backend
//!
//! Calls the Generative Language API directly:
//! `POST {api_base}/v1beta/models/{model}:generateContent`. The persona rides
//! in `systemInstruction`, history maps to `user`/`model` turns and images are
//! sent as inline base64 parts.

use crate::config::GeminiConfig;
use crate::error::{BharatError, Result};
use crate::models::Role;
use crate::prompts::{image_analysis_prompt, title_prompt, PERSONA_PROMPT};
use crate::providers::base::{
    BackendError, BackendErrorKind, ChatBackend, ChatRequest, Completion, ImageData, TokenUsage,
};
use crate::providers::retry::RetryPolicy;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the API key
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Direct Gemini API backend
///
/// # Examples
///
/// ```
/// use bharat_ai::config::GeminiConfig;
/// use bharat_ai::providers::GeminiBackend;
///
/// let config = GeminiConfig {
///     api_key: Some("test-key".to_string()),
///     ..GeminiConfig::default()
/// };
/// let backend = GeminiBackend::new(config).unwrap();
/// assert!(backend.endpoint().ends_with("/v1beta/models/gemini-2.5-flash:generateContent"));
/// ```
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
    api_key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: GeminiContent,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
    #[serde(default)]
    total_token_count: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    fn image(image: &ImageData) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: image.to_base64(),
            }),
        }
    }
}

fn gemini_role(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "model",
    }
}

impl GeminiBackend {
    /// Create a new Gemini backend
    ///
    /// # Errors
    ///
    /// Returns `MissingCredentials` when no API key is configured, or a
    /// provider error if the HTTP client cannot be built
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| BharatError::MissingCredentials("gemini (GEMINI_API_KEY)".to_string()))?;

        let client = Client::builder()
            .user_agent(concat!("bharat-ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BharatError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Gemini backend: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    /// Full `generateContent` URL for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    fn chat_body(request: &ChatRequest) -> GenerateRequest {
        let mut contents: Vec<GeminiContent> = request
            .history
            .iter()
            .map(|turn| GeminiContent {
                role: Some(gemini_role(turn.role).to_string()),
                parts: vec![GeminiPart::text(turn.content.clone())],
            })
            .collect();

        let mut parts = Vec::new();
        if !request.message.is_empty() || request.image.is_none() {
            parts.push(GeminiPart::text(request.message.clone()));
        }
        if let Some(image) = &request.image {
            parts.push(GeminiPart::image(image));
        }
        contents.push(GeminiContent {
            role: Some("user".to_string()),
            parts,
        });

        GenerateRequest {
            system_instruction: Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::text(PERSONA_PROMPT)],
            }),
            contents,
        }
    }

    fn single_turn_body(parts: Vec<GeminiPart>) -> GenerateRequest {
        GenerateRequest {
            system_instruction: None,
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts,
            }],
        }
    }

    async fn generate(
        &self,
        body: &GenerateRequest,
        timeout: Duration,
    ) -> std::result::Result<Completion, BackendError> {
        let url = self.endpoint();
        tracing::debug!("Sending Gemini request: {} contents", body.contents.len());

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e);
                BackendError::from_reqwest(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<ErrorEnvelope>(&error_text) {
                Ok(envelope) => format!(
                    "Gemini API error {} {}: {}",
                    status.as_u16(),
                    envelope.error.status,
                    envelope.error.message
                ),
                Err(_) => format!("Gemini API error {}: {}", status.as_u16(), error_text),
            };
            tracing::error!("{}", detail);
            return Err(BackendError::status(status.as_u16(), detail));
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse Gemini response: {}", e);
            BackendError::new(
                BackendErrorKind::Malformed,
                format!("Failed to parse Gemini response: {}", e),
            )
        })?;

        Self::into_completion(parsed)
    }

    fn into_completion(parsed: GenerateResponse) -> std::result::Result<Completion, BackendError> {
        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(BackendError::new(
                BackendErrorKind::Blocked,
                format!("Prompt blocked by Gemini: {}", reason),
            ));
        }

        let usage = parsed
            .usage_metadata
            .map(|u| {
                TokenUsage::new(
                    u.prompt_token_count,
                    u.candidates_token_count,
                    u.total_token_count,
                )
            })
            .unwrap_or_default();

        let candidate = parsed.candidates.into_iter().next().ok_or_else(|| {
            BackendError::new(BackendErrorKind::Malformed, "Gemini returned no candidates")
        })?;

        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        if text.is_empty() && candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(BackendError::new(
                BackendErrorKind::Blocked,
                "Response blocked by Gemini: finish reason SAFETY",
            ));
        }

        Ok(Completion { text, usage })
    }
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn retry_policy(&self) -> RetryPolicy<BackendError> {
        RetryPolicy::from_config(&self.config.retry)
    }

    async fn complete_chat(
        &self,
        request: &ChatRequest,
    ) -> std::result::Result<Completion, BackendError> {
        let body = Self::chat_body(request);
        self.generate(&body, Duration::from_secs(self.config.chat_timeout_seconds))
            .await
    }

    async fn complete_title(
        &self,
        first_message: &str,
    ) -> std::result::Result<String, BackendError> {
        let body = Self::single_turn_body(vec![GeminiPart::text(title_prompt(first_message))]);
        let completion = self
            .generate(&body, Duration::from_secs(self.config.title_timeout_seconds))
            .await?;
        Ok(completion.text)
    }

    async fn describe_image(
        &self,
        image: &ImageData,
        prompt: Option<&str>,
    ) -> std::result::Result<String, BackendError> {
        let body = Self::single_turn_body(vec![
            GeminiPart::text(image_analysis_prompt(prompt)),
            GeminiPart::image(image),
        ]);
        let completion = self
            .generate(&body, Duration::from_secs(self.config.chat_timeout_seconds))
            .await?;
        Ok(completion.text)
    }
}
