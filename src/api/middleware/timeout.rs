use crate::AppState;
use crate::api::error::AppError;
use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;

/// Per-route deadline for long-running rotation requests.
///
/// Replaces the server default for the wrapped route only and tells the
/// client to hold the connection open for as long as the deadline.
pub async fn extended_timeout(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let secs = state.config.rotation_timeout_secs;

    let mut response = match tokio::time::timeout(Duration::from_secs(secs), next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!("Rotation request exceeded {}s deadline", secs);
            AppError::Timeout(secs).into_response()
        }
    };

    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    if let Ok(value) = HeaderValue::from_str(&format!("timeout={}", secs)) {
        headers.insert(HeaderName::from_static("keep-alive"), value);
    }
    response
}
