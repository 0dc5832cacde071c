//! HTTP API for conversations
//!
//! Exposes `/chats` and `/generate-image` on top of [`ResponseService`] and
//! the SQLite conversation store. The web front end and [`crate::client`]
//! both speak this API.

pub mod error;
pub mod images;
mod routes;

pub use error::ApiError;
pub use images::ImageGenerator;

use crate::config::Config;
use crate::error::{BharatError, Result};
use crate::providers::{create_response_service, ResponseService};
use crate::storage::SqliteStorage;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub service: ResponseService,
    pub storage: SqliteStorage,
    pub images: ImageGenerator,
}

impl AppState {
    /// Build state from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the backend lacks credentials or the database cannot
    /// be opened
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            service: create_response_service(&config.provider)?,
            storage: SqliteStorage::from_config(&config.storage)?,
            images: ImageGenerator::new(config.server.image.clone())?,
        })
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/chats",
            post(routes::send_message)
                .get(routes::list_chats)
                .delete(routes::delete_chat),
        )
        .route("/chats/:id", get(routes::get_chat))
        .route("/generate-image", post(routes::generate_image))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the API server until Ctrl-C
///
/// # Errors
///
/// Returns error if the bind address is invalid, the state cannot be built
/// or the listener fails
pub async fn serve(config: &Config) -> Result<()> {
    let addr: SocketAddr = config.server.bind_addr.parse().map_err(|e| {
        BharatError::Config(format!(
            "Invalid bind address '{}': {}",
            config.server.bind_addr, e
        ))
    })?;

    let state = AppState::from_config(config)?;
    if !state.images.is_configured() {
        tracing::warn!("No image generation endpoint configured; /generate-image will answer 503");
    }
    tracing::info!(
        backend = state.service.backend_name(),
        db = %state.storage.db_path().display(),
        "Server state ready"
    );

    let app = build_router(state);
    tracing::info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP API server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageGenerationConfig;
    use crate::models::{
        ApiErrorBody, ChatDetailResponse, ChatListResponse, SendMessageResponse,
    };
    use crate::providers::{BackendError, ErrorType};
    use crate::test_utils::{temp_dir, ScriptedBackend};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn state_with(backend: ScriptedBackend) -> (AppState, Arc<ScriptedBackend>, TempDir) {
        let dir = temp_dir();
        let backend = Arc::new(backend);
        let state = AppState {
            service: ResponseService::new(backend.clone()),
            storage: SqliteStorage::new_with_path(dir.path().join("chats.db")).unwrap(),
            images: ImageGenerator::new(ImageGenerationConfig::default()).unwrap(),
        };
        (state, backend, dir)
    }

    async fn call(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = build_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn parse<T: DeserializeOwned>(value: Value) -> T {
        serde_json::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _, _dir) = state_with(ScriptedBackend::replying(&[]));
        let (status, body) = call(&state, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["backend"], "scripted");
    }

    #[tokio::test]
    async fn test_new_chat_creates_conversation_with_title() {
        let (state, _, _dir) = state_with(
            ScriptedBackend::replying(&["Paris is the capital of France."])
                .with_title("\"French Capital\""),
        );

        let (status, body) = call(
            &state,
            post_json("/chats", json!({"message": "What is the capital of France?"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sent: SendMessageResponse = parse(body);
        assert!(sent.is_new_chat);
        assert_eq!(sent.chat_title, "French Capital");
        assert_eq!(sent.assistant_message.content, "Paris is the capital of France.");
        assert!(!sent.user_message.is_temporary());
        assert!(sent.updated_at.is_some());

        let (status, body) = call(&state, get("/chats")).await;
        assert_eq!(status, StatusCode::OK);
        let list: ChatListResponse = parse(body);
        assert_eq!(list.chats.len(), 1);
        assert_eq!(list.chats[0].id, sent.chat_id);
        assert_eq!(list.chats[0].message_count, 2);
        assert_eq!(
            list.chats[0].last_message_preview,
            "Paris is the capital of France."
        );
    }

    #[tokio::test]
    async fn test_follow_up_appends_and_forwards_history() {
        let (state, backend, _dir) =
            state_with(ScriptedBackend::replying(&["first reply", "second reply"]));

        let (_, body) = call(&state, post_json("/chats", json!({"message": "one"}))).await;
        let first: SendMessageResponse = parse(body);

        let (status, body) = call(
            &state,
            post_json("/chats", json!({"message": "two", "chatId": first.chat_id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let second: SendMessageResponse = parse(body);
        assert!(!second.is_new_chat);
        assert_eq!(second.chat_id, first.chat_id);
        assert_eq!(backend.seen_history(), vec![0, 2]);

        let (status, body) = call(&state, get(&format!("/chats/{}", first.chat_id))).await;
        assert_eq!(status, StatusCode::OK);
        let detail: ChatDetailResponse = parse(body);
        let contents: Vec<&str> = detail
            .chat
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["one", "first reply", "two", "second reply"]);
    }

    #[tokio::test]
    async fn test_provider_failure_returns_502_and_persists_nothing() {
        let (state, _, _dir) = state_with(ScriptedBackend::failing(BackendError::status(
            401,
            "API key not valid",
        )));

        let (status, body) = call(&state, post_json("/chats", json!({"message": "hi"}))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let error: ApiErrorBody = parse(body);
        assert_eq!(error.error_type, Some(ErrorType::Auth));
        assert_eq!(error.message.as_deref(), Some(ErrorType::Auth.user_message()));
        assert!(!error.error.contains("API key not valid"));

        let (_, body) = call(&state, get("/chats")).await;
        let list: ChatListResponse = parse(body);
        assert!(list.chats.is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let (state, _, _dir) = state_with(ScriptedBackend::replying(&[]));
        let (status, _) = call(&state, post_json("/chats", json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_chat_is_404() {
        let (state, _, _dir) = state_with(ScriptedBackend::replying(&["unused"]));

        let (status, _) = call(&state, get("/chats/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &state,
            post_json("/chats", json!({"message": "hi", "chatId": "missing"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_chat() {
        let (state, _, _dir) = state_with(ScriptedBackend::replying(&["reply"]));
        let (_, body) = call(&state, post_json("/chats", json!({"message": "hi"}))).await;
        let sent: SendMessageResponse = parse(body);

        let (status, _) = call(&state, delete("/chats")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&state, delete(&format!("/chats?chatId={}", sent.chat_id))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (status, _) = call(&state, delete(&format!("/chats?chatId={}", sent.chat_id))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_generated_image_skips_provider() {
        let (state, backend, _dir) =
            state_with(ScriptedBackend::replying(&[]).with_title("Sunset Art"));

        let (status, body) = call(
            &state,
            post_json(
                "/chats",
                json!({
                    "message": "a sunset over the Ganges",
                    "generatedImageUrl": "https://img.example.com/sunset.png"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sent: SendMessageResponse = parse(body);
        let image = sent.assistant_message.image.unwrap();
        assert_eq!(image.url, "https://img.example.com/sunset.png");
        assert!(sent.assistant_message.content.contains("a sunset over the Ganges"));
        assert_eq!(sent.chat_title, "Sunset Art");
        assert!(backend.seen_history().is_empty());
    }

    #[tokio::test]
    async fn test_image_only_message_titled_image_analysis() {
        let (state, _, _dir) = state_with(ScriptedBackend::replying(&["A red square."]));
        let png = [0x89u8, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let data = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, png);

        let (status, body) = call(
            &state,
            post_json(
                "/chats",
                json!({"message": "", "imageData": {"data": data, "mimeType": ""}}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let sent: SendMessageResponse = parse(body);
        assert_eq!(sent.chat_title, "Image Analysis");
        let image = sent.user_message.image.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert!(image.url.starts_with("data:image/png;base64,"));
    }

    #[tokio::test]
    async fn test_generate_image_unconfigured_is_503() {
        let (state, _, _dir) = state_with(ScriptedBackend::replying(&[]));
        let (status, _) = call(
            &state,
            post_json("/generate-image", json!({"prompt": "a tiger"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
