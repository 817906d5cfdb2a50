use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Metadata unreadable: {0}")]
    MetadataUnreadable(String),

    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Request exceeded {0} seconds")]
    Timeout(u64),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Failure body shared by every route
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    pub status: bool,
    pub error: String,
}

impl AppError {
    /// True for errors raised by a processing stage after staging succeeded.
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            AppError::MetadataUnreadable(_)
                | AppError::TranscodeFailed(_)
                | AppError::PublishFailed(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, error) = match &self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "Invalid upload", msg.clone())
            }
            AppError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Invalid upload", msg.clone())
            }
            AppError::MetadataUnreadable(_)
            | AppError::TranscodeFailed(_)
            | AppError::PublishFailed(_) => {
                tracing::error!("Rotation failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Error rotating video",
                    self.to_string(),
                )
            }
            AppError::Timeout(_) => {
                tracing::warn!("{}", self);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "Error rotating video",
                    self.to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(e) => {
                tracing::error!("Anyhow error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            message: message.to_string(),
            status: false,
            error,
        });

        (status, body).into_response()
    }
}
