use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub staging: String,
    pub ffmpeg: String,
    pub ffprobe: String,
    pub storage: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
pub struct PingResponse {
    pub greeting: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let staging_status = match tokio::fs::metadata(state.rotation.staging().dir()).await {
        Ok(meta) if meta.is_dir() && !meta.permissions().readonly() => "writable",
        Ok(_) => "read-only",
        Err(_) => "missing",
    };

    let tool_status = |bin: &str| {
        if which::which(bin).is_ok() {
            "available"
        } else {
            "missing"
        }
    };
    let ffmpeg_status = tool_status(&state.config.ffmpeg_path);
    let ffprobe_status = tool_status(&state.config.ffprobe_path);

    // A missing object still proves the bucket answered
    let storage_status = if state.storage.file_exists("health-check").await.is_ok() {
        "connected"
    } else {
        "disconnected"
    };

    let healthy = staging_status == "writable"
        && ffmpeg_status == "available"
        && ffprobe_status == "available"
        && storage_status == "connected";

    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" }.to_string(),
        staging: staging_status.to_string(),
        ffmpeg: ffmpeg_status.to_string(),
        ffprobe: ffprobe_status.to_string(),
        storage: storage_status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/ping",
    responses(
        (status = 200, description = "Liveness probe", body = PingResponse)
    ),
    tag = "system"
)]
pub async fn ping() -> Json<PingResponse> {
    Json(PingResponse {
        greeting: "Server Is In Good Health!".to_string(),
    })
}
