use crate::error::BharatError;
use crate::models::ApiErrorBody;
use crate::providers::ErrorType;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Error returned by route handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Chat not found: {0}")]
    NotFound(String),

    /// The response backend failed; `message` is already user-facing
    #[error("Failed to generate response")]
    Provider {
        error_type: ErrorType,
        message: String,
    },

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Not configured: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<BharatError>() {
            Some(BharatError::InvalidRequest(msg)) => ApiError::BadRequest(msg.clone()),
            Some(BharatError::ConversationNotFound(id)) => ApiError::NotFound(id.clone()),
            Some(BharatError::Provider(msg)) => ApiError::Upstream(msg.clone()),
            Some(BharatError::Config(msg)) => ApiError::Unavailable(msg.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, plain(self.to_string())),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, plain("Chat not found".to_string())),
            ApiError::Provider {
                error_type,
                message,
            } => (
                StatusCode::BAD_GATEWAY,
                ApiErrorBody {
                    error: self.to_string(),
                    error_type: Some(*error_type),
                    message: Some(message.clone()),
                },
            ),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, plain(self.to_string())),
            ApiError::Unavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, plain(self.to_string()))
            }
            ApiError::Internal(detail) => {
                tracing::error!("Request failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    plain("Internal server error".to_string()),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn plain(error: String) -> ApiErrorBody {
    ApiErrorBody {
        error,
        error_type: None,
        message: None,
    }
}
