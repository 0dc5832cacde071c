//! Configuration management for Bharat AI
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{BharatError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration structure for Bharat AI
///
/// Holds everything the server, the chat client and the update watcher
/// need. Secrets are never serialized back out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Response provider configuration (Gemini, webhook relay)
    pub provider: ProviderConfig,
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat client configuration
    #[serde(default)]
    pub client: ClientConfig,
    /// Conversation storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Update/notification watcher configuration
    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Provider configuration
///
/// Specifies which backend produces chat responses and its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use ("gemini" or "webhook")
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Direct Gemini API configuration
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Webhook relay configuration
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Retry thresholds for a backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Additional attempts after the first one, only for overload failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay before the first retry; doubles on each further retry
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Base delay as a `Duration`
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Gemini provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; usually supplied through `GEMINI_API_KEY`
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// API base URL (overridable for tests and proxies)
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// Model to use
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Timeout for chat and image-analysis calls (seconds)
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_seconds: u64,

    /// Timeout for title generation calls (seconds)
    #[serde(default = "default_title_timeout")]
    pub title_timeout_seconds: u64,

    /// Overload retry thresholds
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_chat_timeout() -> u64 {
    60
}

fn default_title_timeout() -> u64 {
    10
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_gemini_api_base(),
            model: default_gemini_model(),
            chat_timeout_seconds: default_chat_timeout(),
            title_timeout_seconds: default_title_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// Webhook relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Webhook URL; usually supplied through `N8N_WEBHOOK_URL`
    #[serde(default)]
    pub url: Option<String>,

    /// Optional bearer secret; usually supplied through `N8N_WEBHOOK_SECRET`
    #[serde(default, skip_serializing)]
    pub secret: Option<String>,

    /// Timeout for chat and image-analysis calls (seconds)
    #[serde(default = "default_chat_timeout")]
    pub chat_timeout_seconds: u64,

    /// Timeout for title generation calls (seconds)
    #[serde(default = "default_title_timeout")]
    pub title_timeout_seconds: u64,

    /// Overload retry thresholds
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            chat_timeout_seconds: default_chat_timeout(),
            title_timeout_seconds: default_title_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the API server to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Image generation upstream used by `/generate-image`
    #[serde(default)]
    pub image: ImageGenerationConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            image: ImageGenerationConfig::default(),
        }
    }
}

/// Image generation upstream configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationConfig {
    /// Upstream endpoint accepting `{prompt, model, size}`
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Optional bearer token for the upstream
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Model requested when the client does not name one
    #[serde(default = "default_image_model")]
    pub default_model: String,

    /// Size requested when the client does not name one
    #[serde(default = "default_image_size")]
    pub default_size: String,

    /// Timeout for generation calls (seconds)
    #[serde(default = "default_chat_timeout")]
    pub timeout_seconds: u64,
}

fn default_image_model() -> String {
    "flux".to_string()
}

fn default_image_size() -> String {
    "1024x1024".to_string()
}

impl Default for ImageGenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            default_model: default_image_model(),
            default_size: default_image_size(),
            timeout_seconds: default_chat_timeout(),
        }
    }
}

/// Chat client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the chat API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Request timeout (seconds); must cover provider retries
    #[serde(default = "default_client_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_url() -> String {
    format!("http://{}", default_bind_addr())
}

fn default_client_timeout() -> u64 {
    120
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_seconds: default_client_timeout(),
        }
    }
}

/// Conversation storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Explicit database path; defaults to the user data directory
    #[serde(default)]
    pub db_path: Option<String>,
}

/// Update watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Remote worker script to poll for new versions
    #[serde(default)]
    pub script_url: Option<String>,

    /// Poll interval (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            script_url: None,
            poll_interval_seconds: default_poll_interval(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig {
                provider_type: "gemini".to_string(),
                gemini: GeminiConfig::default(),
                webhook: WebhookConfig::default(),
            },
            server: ServerConfig::default(),
            client: ClientConfig::default(),
            storage: StorageConfig::default(),
            notify: NotifyConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BharatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| BharatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("BHARAT_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        // Credentials keep the names the hosted deployment already uses
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            self.provider.gemini.api_key = Some(api_key);
        }

        if let Ok(model) = std::env::var("BHARAT_GEMINI_MODEL") {
            self.provider.gemini.model = model;
        }

        if let Ok(url) = std::env::var("N8N_WEBHOOK_URL") {
            self.provider.webhook.url = Some(url);
        }

        if let Ok(secret) = std::env::var("N8N_WEBHOOK_SECRET") {
            self.provider.webhook.secret = Some(secret);
        }

        if let Ok(timeout) = std::env::var("BHARAT_WEBHOOK_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.provider.webhook.chat_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid BHARAT_WEBHOOK_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(retries) = std::env::var("BHARAT_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(v) => {
                    self.provider.gemini.retry.max_retries = v;
                    self.provider.webhook.retry.max_retries = v;
                    tracing::debug!(max_retries = v, "Env override: BHARAT_MAX_RETRIES");
                }
                Err(_) => tracing::warn!("Invalid BHARAT_MAX_RETRIES: {}", retries),
            }
        }

        if let Ok(bind_addr) = std::env::var("BHARAT_BIND_ADDR") {
            self.server.bind_addr = bind_addr;
        }

        if let Ok(endpoint) = std::env::var("BHARAT_IMAGE_API_URL") {
            self.server.image.endpoint = Some(endpoint);
        }

        if let Ok(key) = std::env::var("BHARAT_IMAGE_API_KEY") {
            self.server.image.api_key = Some(key);
        }

        if let Ok(api_url) = std::env::var("BHARAT_API_URL") {
            self.client.api_url = api_url;
        }

        if let Ok(db_path) = std::env::var("BHARAT_HISTORY_DB") {
            self.storage.db_path = Some(db_path);
        }

        if let Ok(script_url) = std::env::var("BHARAT_WORKER_SCRIPT_URL") {
            self.notify.script_url = Some(script_url);
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(api_url) = &cli.api_url {
            tracing::debug!("Using API URL override: {}", api_url);
            self.client.api_url = api_url.clone();
        }
        if let Some(db_path) = &cli.storage_path {
            tracing::debug!("Using storage DB override: {}", db_path);
            self.storage.db_path = Some(db_path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set. Missing credentials are
    /// not checked here; the provider factory reports those.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(BharatError::Config("Provider type cannot be empty".to_string()).into());
        }

        let valid_providers = ["gemini", "webhook"];
        if !valid_providers.contains(&self.provider.provider_type.as_str()) {
            return Err(BharatError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                valid_providers.join(", ")
            ))
            .into());
        }

        for (name, chat, title, retry) in [
            (
                "gemini",
                self.provider.gemini.chat_timeout_seconds,
                self.provider.gemini.title_timeout_seconds,
                &self.provider.gemini.retry,
            ),
            (
                "webhook",
                self.provider.webhook.chat_timeout_seconds,
                self.provider.webhook.title_timeout_seconds,
                &self.provider.webhook.retry,
            ),
        ] {
            if chat == 0 || title == 0 {
                return Err(BharatError::Config(format!(
                    "provider.{}: timeouts must be greater than 0",
                    name
                ))
                .into());
            }
            if retry.max_retries > 10 {
                return Err(BharatError::Config(format!(
                    "provider.{}.retry.max_retries must be less than or equal to 10",
                    name
                ))
                .into());
            }
            if retry.base_delay_ms == 0 {
                return Err(BharatError::Config(format!(
                    "provider.{}.retry.base_delay_ms must be greater than 0",
                    name
                ))
                .into());
            }
        }

        if let Some(webhook_url) = &self.provider.webhook.url {
            url::Url::parse(webhook_url).map_err(|e| {
                BharatError::Config(format!("Invalid webhook url {}: {}", webhook_url, e))
            })?;
        }

        url::Url::parse(&self.client.api_url).map_err(|e| {
            BharatError::Config(format!("Invalid client.api_url {}: {}", self.client.api_url, e))
        })?;

        if self.notify.poll_interval_seconds == 0 {
            return Err(BharatError::Config(
                "notify.poll_interval_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
