//! Image generation proxy
//!
//! Forwards `{prompt, model, size}` to the configured generation endpoint and
//! normalizes whatever URL shape it answers with.

use crate::config::ImageGenerationConfig;
use crate::error::{BharatError, Result};
use crate::models::{GenerateImageRequest, GeneratedImage};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

/// Client for the upstream image generation service
#[derive(Clone)]
pub struct ImageGenerator {
    client: Client,
    config: ImageGenerationConfig,
}

impl ImageGenerator {
    /// Create a generator from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: ImageGenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("bharat-ai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BharatError::Provider(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Whether an upstream endpoint is configured
    pub fn is_configured(&self) -> bool {
        self.config.endpoint.is_some()
    }

    /// Generate an image for a prompt
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an empty prompt
    /// - `Config` when no endpoint is configured
    /// - `Provider` when the upstream fails or answers without a URL
    pub async fn generate(&self, request: &GenerateImageRequest) -> Result<GeneratedImage> {
        let prompt = request.prompt.trim();
        if prompt.is_empty() {
            return Err(BharatError::InvalidRequest("Prompt is required".to_string()).into());
        }

        let endpoint = self.config.endpoint.as_deref().ok_or_else(|| {
            BharatError::Config("Image generation endpoint is not configured".to_string())
        })?;

        let model = request
            .model
            .as_deref()
            .unwrap_or(&self.config.default_model);
        let size = request.size.as_deref().unwrap_or(&self.config.default_size);

        tracing::info!(model, size, "Requesting image generation");

        let mut builder = self
            .client
            .post(endpoint)
            .json(&json!({"prompt": prompt, "model": model, "size": size}));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!("Image generation request failed: {}", e);
            BharatError::Provider(format!("Image generation request failed: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Image service returned error {}: {}", status, error_text);
            return Err(BharatError::Provider(format!(
                "Image service returned error {}",
                status.as_u16()
            ))
            .into());
        }

        let body: Value = response.json().await.map_err(|e| {
            BharatError::Provider(format!("Failed to parse image service response: {}", e))
        })?;

        extract_url(&body)
            .map(|url| GeneratedImage { url })
            .ok_or_else(|| {
                BharatError::Provider("Image service response had no URL".to_string()).into()
            })
    }
}

/// Pull the image URL out of `{image: {url}}`, `{url}` or `{data: [{url}]}`
fn extract_url(body: &Value) -> Option<String> {
    body.pointer("/image/url")
        .or_else(|| body.get("url"))
        .or_else(|| body.pointer("/data/0/url"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(prompt: &str) -> GenerateImageRequest {
        GenerateImageRequest {
            prompt: prompt.to_string(),
            model: None,
            size: None,
        }
    }

    #[test]
    fn test_extract_url_shapes() {
        assert_eq!(
            extract_url(&json!({"image": {"url": "https://a/1.png"}})).as_deref(),
            Some("https://a/1.png")
        );
        assert_eq!(
            extract_url(&json!({"url": "https://a/2.png"})).as_deref(),
            Some("https://a/2.png")
        );
        assert_eq!(
            extract_url(&json!({"data": [{"url": "https://a/3.png"}]})).as_deref(),
            Some("https://a/3.png")
        );
        assert_eq!(extract_url(&json!({"status": "queued"})), None);
    }

    #[tokio::test]
    async fn test_generate_requires_endpoint() {
        let generator = ImageGenerator::new(ImageGenerationConfig::default()).unwrap();
        assert!(!generator.is_configured());
        let err = generator.generate(&request("a tiger")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BharatError>(),
            Some(BharatError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_rejects_blank_prompt() {
        let generator = ImageGenerator::new(ImageGenerationConfig::default()).unwrap();
        let err = generator.generate(&request("   ")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BharatError>(),
            Some(BharatError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_applies_defaults_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer img-key"))
            .and(body_json(json!({"prompt": "Taj Mahal at dawn", "model": "flux", "size": "1024x1024"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"url": "https://img.example.com/t.png"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let generator = ImageGenerator::new(ImageGenerationConfig {
            endpoint: Some(format!("{}/generate", server.uri())),
            api_key: Some("img-key".to_string()),
            ..ImageGenerationConfig::default()
        })
        .unwrap();

        let image = generator.generate(&request("Taj Mahal at dawn")).await.unwrap();
        assert_eq!(image.url, "https://img.example.com/t.png");
    }
}
