use crate::api::error::AppError;
use crate::models::StagedAsset;
use crate::services::cleanup::{ReclaimGuard, reclaim_files};
use crate::utils::validation::validate_video_mime;
use axum::{
    body::Body,
    extract::{Multipart, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

/// Multipart field carrying the upload
pub const VIDEO_FIELD: &str = "video";

#[derive(Debug, Serialize, ToSchema)]
pub struct RotateVideoResponse {
    pub message: String,
    pub status: bool,
    /// Object key inside the bucket
    pub link: String,
    #[serde(rename = "publicUrl")]
    pub public_url: String,
}

/// Documentation-only shape of the multipart form
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct RotateVideoForm {
    #[schema(value_type = String, format = Binary)]
    video: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/rotate-video",
    request_body(content = RotateVideoForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video rotated and published", body = RotateVideoResponse),
        (status = 400, description = "Missing file or non-video content", body = crate::api::error::ErrorResponse),
        (status = 413, description = "Upload exceeds the size limit", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Processing failed", body = crate::api::error::ErrorResponse)
    ),
    tag = "videos"
)]
pub async fn rotate_video(
    State(state): State<crate::AppState>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    let mut staged: Option<StagedAsset> = None;

    let admitted: Result<StagedAsset, AppError> = async {
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name() != Some(VIDEO_FIELD) {
                continue;
            }
            if staged.is_some() {
                return Err(AppError::Validation(
                    "Only one video file may be uploaded".to_string(),
                ));
            }

            let file_name = field
                .file_name()
                .map(str::to_string)
                .ok_or_else(|| AppError::Validation("The video field must be a file".to_string()))?;

            // Rejected before anything touches the disk
            let mime = validate_video_mime(field.content_type())
                .map_err(|_| {
                    AppError::Validation(
                        "Invalid file type. Only video files are allowed.".to_string(),
                    )
                })?;

            let reader = StreamReader::new(Box::pin(field.map_err(std::io::Error::other)));
            staged = Some(
                state
                    .rotation
                    .staging()
                    .stage(&file_name, mime.essence_str(), reader)
                    .await?,
            );
        }

        staged
            .take()
            .ok_or_else(|| AppError::Validation("No video file uploaded".to_string()))
    }
    .await;

    let staged = match admitted {
        Ok(staged) => staged,
        Err(e) => {
            tracing::warn!("Upload rejected: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            if let Some(orphan) = staged.take() {
                reclaim_files(&[orphan.path]).await;
            }
            return Err(e);
        }
    };

    let outcome = state.rotation.rotate(staged).await?;

    let guard = ReclaimGuard::new(state.rotation.cleanup().clone(), outcome.scratch_files);

    let body = RotateVideoResponse {
        message: "Video rotated successfully".to_string(),
        status: true,
        link: outcome.published.bucket_key,
        public_url: outcome.published.public_url,
    };

    respond_then_reclaim(&body, guard)
}

fn multipart_error(e: MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::Validation(err_msg)
    }
}

/// Single-chunk body that owns the cleanup guard. The server drops the body
/// once it has been written out (or the connection is gone), which is when
/// cleanup starts.
struct ReclaimingBody {
    chunk: Option<Bytes>,
    _guard: ReclaimGuard,
}

impl Stream for ReclaimingBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunk.take().map(Ok))
    }
}

fn respond_then_reclaim(
    body: &RotateVideoResponse,
    guard: ReclaimGuard,
) -> Result<Response, AppError> {
    let bytes = serde_json::to_vec(body)
        .map_err(|e| AppError::Internal(format!("Failed to encode response: {}", e)))?;
    let len = bytes.len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, len)
        .body(Body::from_stream(ReclaimingBody {
            chunk: Some(Bytes::from(bytes)),
            _guard: guard,
        }))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
