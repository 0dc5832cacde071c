//! Provider module for Bharat AI
//!
//! This module contains the response backend abstraction, its two
//! implementations (direct Gemini API and webhook relay) and the
//! backend-agnostic [`ResponseService`] that callers use.

pub mod base;
pub mod classify;
pub mod gemini;
pub mod retry;
pub mod service;
pub mod shapes;
pub mod webhook;

pub use base::{
    BackendError, BackendErrorKind, ChatBackend, ChatFailure, ChatOutcome, ChatRequest,
    ChatSuccess, ChatTurn, Completion, ImageAnalysis, ImageData, TokenUsage,
};
pub use classify::{classify, ErrorType};
pub use gemini::GeminiBackend;
pub use retry::{retry_with_backoff, RetryPolicy, RetryState};
pub use service::{ResponseService, HISTORY_WINDOW, IMAGE_ANALYSIS_APOLOGY};
pub use webhook::WebhookBackend;

use crate::config::ProviderConfig;
use crate::error::{BharatError, Result};
use std::sync::Arc;

/// Create a backend instance based on configuration
///
/// # Arguments
///
/// * `config` - Provider configuration; `provider_type` selects the backend
///
/// # Returns
///
/// Returns a shared backend instance
///
/// # Errors
///
/// Returns error if the provider type is unknown or the selected backend
/// is missing its credentials
pub fn create_backend(config: &ProviderConfig) -> Result<Arc<dyn ChatBackend>> {
    match config.provider_type.as_str() {
        "gemini" => Ok(Arc::new(GeminiBackend::new(config.gemini.clone())?)),
        "webhook" => Ok(Arc::new(WebhookBackend::new(config.webhook.clone())?)),
        other => Err(BharatError::Provider(format!("Unknown provider type: {}", other)).into()),
    }
}

/// Create the response service for the configured backend
///
/// # Errors
///
/// Same as [`create_backend`]
pub fn create_response_service(config: &ProviderConfig) -> Result<ResponseService> {
    let backend = create_backend(config)?;
    tracing::info!("Using {} response backend", backend.name());
    Ok(ResponseService::new(backend))
}
