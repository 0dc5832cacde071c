//! Client-side conversation index
//!
//! [`ChatStore`] mirrors the remote conversation list, keeps it ordered by
//! the server's `updated_at` (newest first) and tracks which conversation
//! is current. Remote failures never mutate the local index.

use crate::client::ChatApi;
use crate::error::{BharatError, Result};
use crate::models::{preview_of, ConversationSummary, Message, SendMessageResponse};
use std::sync::Arc;

/// Recency-ordered conversation index
pub struct ChatStore {
    api: Arc<dyn ChatApi>,
    conversations: Vec<ConversationSummary>,
    current: Option<String>,
}

impl ChatStore {
    /// Create an empty store
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            conversations: Vec::new(),
            current: None,
        }
    }

    /// Reload the index from the server
    ///
    /// The current conversation is kept when it still exists.
    ///
    /// # Errors
    ///
    /// Returns the API error; the local index is left unchanged
    pub async fn refresh(&mut self) -> Result<()> {
        let mut conversations = self.api.list_chats().await?;
        sort_by_recency(&mut conversations);
        dedup_ids(&mut conversations);

        self.conversations = conversations;
        if let Some(current) = &self.current {
            if !self.contains(current) {
                self.current = None;
            }
        }
        tracing::debug!(count = self.conversations.len(), "Conversation index refreshed");
        Ok(())
    }

    /// Conversations, most recently updated first
    pub fn list(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    /// Whether the index holds `id`
    pub fn contains(&self, id: &str) -> bool {
        self.conversations.iter().any(|c| c.id == id)
    }

    /// Summary of `id`
    pub fn get(&self, id: &str) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.id == id)
    }

    /// Id of the current conversation
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Summary of the current conversation
    pub fn current(&self) -> Option<&ConversationSummary> {
        self.current.as_deref().and_then(|id| self.get(id))
    }

    /// Clear the current conversation to start a new one
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// Add a conversation created by its first successful exchange
    ///
    /// Becomes the current conversation. A response that did not create a
    /// conversation is recorded as a follow-up instead.
    pub fn create(&mut self, first_exchange: &SendMessageResponse) {
        if !first_exchange.is_new_chat || self.contains(&first_exchange.chat_id) {
            self.record_exchange(first_exchange);
            return;
        }

        let updated_at = exchange_time(first_exchange);
        let summary = ConversationSummary {
            id: first_exchange.chat_id.clone(),
            title: first_exchange.chat_title.clone(),
            message_count: 2,
            last_message_preview: preview_of(&first_exchange.assistant_message.content),
            created_at: first_exchange.user_message.timestamp.min(updated_at),
            updated_at,
        };
        tracing::info!(chat_id = %summary.id, title = %summary.title, "Conversation created");

        self.conversations.push(summary);
        sort_by_recency(&mut self.conversations);
        self.current = Some(first_exchange.chat_id.clone());
    }

    /// Record a completed exchange on an existing conversation
    ///
    /// Adds two messages, refreshes the preview and `updated_at` from the
    /// server and re-sorts the index.
    pub fn record_exchange(&mut self, exchange: &SendMessageResponse) {
        let position = self
            .conversations
            .iter()
            .position(|c| c.id == exchange.chat_id);
        let Some(position) = position else {
            if exchange.is_new_chat {
                self.create(exchange);
            } else {
                tracing::warn!(chat_id = %exchange.chat_id, "Exchange for unknown conversation ignored");
            }
            return;
        };

        let summary = &mut self.conversations[position];
        summary.message_count += 2;
        summary.last_message_preview = preview_of(&exchange.assistant_message.content);
        summary.updated_at = exchange_time(exchange);
        sort_by_recency(&mut self.conversations);
    }

    /// Make `id` current and fetch its full history
    ///
    /// Other conversations are untouched.
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` for ids outside the index, or the API
    /// error; in both cases the current conversation does not change
    pub async fn select(&mut self, id: &str) -> Result<Vec<Message>> {
        if !self.contains(id) {
            return Err(BharatError::ConversationNotFound(id.to_string()).into());
        }
        let messages = self.api.get_chat(id).await?;
        self.current = Some(id.to_string());
        Ok(messages)
    }

    /// Delete a conversation after `confirm` approves it
    ///
    /// When the current conversation is deleted, current falls back to the
    /// most recent remaining conversation, or `None`.
    ///
    /// # Returns
    ///
    /// `Ok(false)` when the confirmation was declined; nothing is sent
    ///
    /// # Errors
    ///
    /// Returns `ConversationNotFound` for unknown ids, or the API error; the
    /// index is unchanged in both cases
    pub async fn delete<F>(&mut self, id: &str, confirm: F) -> Result<bool>
    where
        F: FnOnce(&ConversationSummary) -> bool,
    {
        let summary = self
            .get(id)
            .ok_or_else(|| BharatError::ConversationNotFound(id.to_string()))?;
        if !confirm(summary) {
            tracing::debug!(chat_id = %id, "Deletion declined");
            return Ok(false);
        }

        self.api.delete_chat(id).await?;

        self.conversations.retain(|c| c.id != id);
        if self.current.as_deref() == Some(id) {
            self.current = self.conversations.first().map(|c| c.id.clone());
        }
        tracing::info!(chat_id = %id, "Conversation deleted");
        Ok(true)
    }
}

fn exchange_time(exchange: &SendMessageResponse) -> chrono::DateTime<chrono::Utc> {
    exchange
        .updated_at
        .unwrap_or(exchange.assistant_message.timestamp)
}

/// Newest `updated_at` first; ties keep their existing order
fn sort_by_recency(conversations: &mut [ConversationSummary]) {
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

fn dedup_ids(conversations: &mut Vec<ConversationSummary>) {
    let mut seen = std::collections::HashSet::new();
    conversations.retain(|c| seen.insert(c.id.clone()));
}
