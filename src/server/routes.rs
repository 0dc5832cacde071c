use super::error::ApiError;
use super::AppState;
use crate::models::{
    ChatDetail, ChatDetailResponse, ChatListResponse, DeleteResponse, GenerateImageRequest,
    GenerateImageResponse, ImageRef, InlineImage, Message, Role, SendMessageRequest,
    SendMessageResponse,
};
use crate::providers::base::sniff_mime_type;
use crate::providers::{ChatOutcome, ImageData};
use crate::storage::SqliteStorage;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Title used when a conversation starts with an image and no text
const IMAGE_ONLY_TITLE: &str = "Image Analysis";

/// MIME type recorded for generated images
const GENERATED_IMAGE_MIME: &str = "image/png";

#[derive(Serialize)]
pub(super) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    backend: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DeleteParams {
    chat_id: Option<String>,
}

pub(super) async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.service.backend_name(),
    })
}

/// Run a storage call on the blocking pool
///
/// SQLite access is synchronous; handlers must not hold a runtime worker
/// while it runs.
async fn with_storage<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&SqliteStorage) -> crate::error::Result<T> + Send + 'static,
{
    let storage = state.storage.clone();
    let result = tokio::task::spawn_blocking(move || op(&storage))
        .await
        .map_err(|e| ApiError::Internal(format!("storage task panicked: {e}")))?;
    Ok(result?)
}

fn decode_upload(upload: &InlineImage) -> Result<ImageData, ApiError> {
    let image = ImageData::from_base64(&upload.data, upload.mime_type.clone())?;
    if image.bytes.is_empty() {
        return Err(ApiError::BadRequest("Image data is empty".to_string()));
    }
    if image.mime_type.trim().is_empty() {
        let sniffed = sniff_mime_type(&image.bytes)
            .ok_or_else(|| ApiError::BadRequest("Unsupported image format".to_string()))?;
        return Ok(ImageData::new(image.bytes, sniffed));
    }
    Ok(image)
}

/// `POST /chats`
///
/// The conversation is created only after the assistant reply exists; a
/// provider failure persists nothing and answers 502.
pub(super) async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let text = request.message.trim().to_string();
    if text.is_empty() && request.image_data.is_none() && request.generated_image_url.is_none() {
        return Err(ApiError::BadRequest(
            "Message or image is required".to_string(),
        ));
    }

    let history = match &request.chat_id {
        Some(chat_id) => {
            let id = chat_id.clone();
            with_storage(&state, move |storage| storage.load_conversation(&id))
                .await?
                .ok_or_else(|| ApiError::NotFound(chat_id.clone()))?
                .messages
        }
        None => Vec::new(),
    };

    let upload = request.image_data.as_ref().map(decode_upload).transpose()?;

    let user_image = match (&request.image_data, &upload) {
        (Some(inline), Some(decoded)) => {
            let stored = InlineImage {
                data: inline.data.trim().to_string(),
                mime_type: decoded.mime_type.clone(),
            };
            Some(ImageRef {
                url: stored.to_data_url(),
                mime_type: stored.mime_type,
            })
        }
        _ => None,
    };

    let assistant_message = match &request.generated_image_url {
        Some(url) => {
            tracing::info!("Recording generated image exchange");
            Message::new(
                Role::Assistant,
                format!("Here is the image I created for: \"{}\"", text),
            )
            .with_image(Some(ImageRef {
                url: url.clone(),
                mime_type: GENERATED_IMAGE_MIME.to_string(),
            }))
        }
        None => match state
            .service
            .generate_chat_response(&text, &history, upload)
            .await
        {
            ChatOutcome::Success(success) => Message::new(Role::Assistant, success.message),
            ChatOutcome::Failure(failure) => {
                tracing::warn!(
                    error_type = %failure.error_type,
                    "Chat response failed, nothing persisted"
                );
                return Err(ApiError::Provider {
                    error_type: failure.error_type,
                    message: failure.message,
                });
            }
        },
    };

    let user_message = Message::new(Role::User, text.clone()).with_image(user_image);

    let (summary, is_new_chat) = match request.chat_id.clone() {
        Some(chat_id) => {
            let (user, assistant) = (user_message.clone(), assistant_message.clone());
            let summary = with_storage(&state, move |storage| {
                storage.append_exchange(&chat_id, &user, &assistant)
            })
            .await?;
            (summary, false)
        }
        None => {
            let title = if text.is_empty() {
                IMAGE_ONLY_TITLE.to_string()
            } else {
                state.service.generate_chat_title(&text).await
            };
            let (user, assistant) = (user_message.clone(), assistant_message.clone());
            let summary = with_storage(&state, move |storage| {
                storage.create_conversation(&title, &user, &assistant)
            })
            .await?;
            (summary, true)
        }
    };

    metrics::increment_counter!("bharat_exchanges_total", "new_chat" => if is_new_chat { "true" } else { "false" });
    tracing::info!(
        chat_id = %summary.id,
        is_new_chat,
        message_count = summary.message_count,
        "Exchange recorded"
    );

    Ok(Json(SendMessageResponse {
        chat_id: summary.id,
        chat_title: summary.title,
        is_new_chat,
        user_message,
        assistant_message,
        updated_at: Some(summary.updated_at),
    }))
}

/// `GET /chats`
pub(super) async fn list_chats(
    State(state): State<AppState>,
) -> Result<Json<ChatListResponse>, ApiError> {
    let chats = with_storage(&state, |storage| storage.list_summaries()).await?;
    Ok(Json(ChatListResponse { chats }))
}

/// `GET /chats/:id`
pub(super) async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ChatDetailResponse>, ApiError> {
    let lookup = id.clone();
    let stored = with_storage(&state, move |storage| storage.load_conversation(&lookup))
        .await?
        .ok_or_else(|| ApiError::NotFound(id))?;
    Ok(Json(ChatDetailResponse {
        chat: ChatDetail {
            id: stored.summary.id,
            title: stored.summary.title,
            messages: stored.messages,
        },
    }))
}

/// `DELETE /chats?chatId=<id>`
pub(super) async fn delete_chat(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let chat_id = params
        .chat_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("chatId is required".to_string()))?;

    let target = chat_id.clone();
    if !with_storage(&state, move |storage| storage.delete_conversation(&target)).await? {
        return Err(ApiError::NotFound(chat_id));
    }
    tracing::info!(chat_id = %chat_id, "Conversation deleted");
    Ok(Json(DeleteResponse { success: true }))
}

/// `POST /generate-image`
pub(super) async fn generate_image(
    State(state): State<AppState>,
    Json(request): Json<GenerateImageRequest>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    let image = state.images.generate(&request).await?;
    Ok(Json(GenerateImageResponse { image }))
}
