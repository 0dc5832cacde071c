//! Typed HTTP client for the chat API
//!
//! [`ChatApi`] is the seam the client-side session and store talk through;
//! [`HttpChatApi`] implements it over `reqwest` against the server in
//! [`crate::server`].

use crate::config::ClientConfig;
use crate::error::{BharatError, Result};
use crate::models::{
    ApiErrorBody, ChatDetailResponse, ChatListResponse, ConversationSummary, DeleteResponse,
    GenerateImageRequest, GenerateImageResponse, GeneratedImage, Message, SendMessageRequest,
    SendMessageResponse,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Remote conversation API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send one user turn; creates the conversation when `chat_id` is absent
    async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse>;

    /// Conversation summaries, most recently updated first
    async fn list_chats(&self) -> Result<Vec<ConversationSummary>>;

    /// Full message list of one conversation
    async fn get_chat(&self, chat_id: &str) -> Result<Vec<Message>>;

    /// Delete a conversation
    async fn delete_chat(&self, chat_id: &str) -> Result<()>;

    /// Generate an image for a prompt
    async fn generate_image(&self, request: &GenerateImageRequest) -> Result<GeneratedImage>;
}

/// [`ChatApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpChatApi {
    client: Client,
    base_url: String,
}

impl HttpChatApi {
    /// Create a client for the configured API URL
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use bharat_ai::client::HttpChatApi;
    /// use bharat_ai::config::ClientConfig;
    ///
    /// let api = HttpChatApi::new(&ClientConfig::default()).unwrap();
    /// assert_eq!(api.base_url(), "http://127.0.0.1:8787");
    /// ```
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("bharat-ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BharatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => body.message.unwrap_or(body.error),
            Err(_) if text.is_empty() => status.to_string(),
            Err(_) => text,
        };
        tracing::debug!(status = status.as_u16(), "Chat API returned error: {}", message);
        Err(BharatError::ChatApi {
            status: status.as_u16(),
            message,
        }
        .into())
    }
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn send_message(&self, request: &SendMessageRequest) -> Result<SendMessageResponse> {
        let response = self
            .client
            .post(self.url("/chats"))
            .json(request)
            .send()
            .await?;
        Self::read(response).await
    }

    async fn list_chats(&self) -> Result<Vec<ConversationSummary>> {
        let response = self.client.get(self.url("/chats")).send().await?;
        let list: ChatListResponse = Self::read(response).await?;
        Ok(list.chats)
    }

    async fn get_chat(&self, chat_id: &str) -> Result<Vec<Message>> {
        let response = self
            .client
            .get(self.url(&format!("/chats/{}", chat_id)))
            .send()
            .await?;
        let detail: ChatDetailResponse = Self::read(response).await?;
        Ok(detail.chat.messages)
    }

    async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url("/chats"))
            .query(&[("chatId", chat_id)])
            .send()
            .await?;
        let deleted: DeleteResponse = Self::read(response).await?;
        if !deleted.success {
            return Err(BharatError::ChatApi {
                status: 200,
                message: "Delete was not acknowledged".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn generate_image(&self, request: &GenerateImageRequest) -> Result<GeneratedImage> {
        let response = self
            .client
            .post(self.url("/generate-image"))
            .json(request)
            .send()
            .await?;
        let generated: GenerateImageResponse = Self::read(response).await?;
        Ok(generated.image)
    }
}
