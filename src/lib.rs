pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers::{health, videos};
use crate::api::middleware::{request_id::request_id_middleware, timeout::extended_timeout};
use crate::config::ServiceConfig;
use crate::services::rotation_service::RotationService;
use crate::services::storage::ObjectStore;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Headroom over the upload limit for multipart boundaries and headers
const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::videos::rotate_video,
        api::handlers::health::health_check,
        api::handlers::health::ping,
    ),
    components(
        schemas(
            api::handlers::videos::RotateVideoResponse,
            api::handlers::videos::RotateVideoForm,
            api::handlers::health::HealthResponse,
            api::handlers::health::PingResponse,
            api::error::ErrorResponse,
            models::VideoMetadata,
            models::PublishedObject,
        )
    ),
    tags(
        (name = "videos", description = "Orientation normalization"),
        (name = "system", description = "Liveness and health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub storage: Arc<dyn ObjectStore>,
    pub rotation: Arc<RotationService>,
}

pub fn create_app(state: AppState) -> Router {
    let default_timeout = Duration::from_secs(state.config.default_timeout_secs);
    let body_limit = state
        .config
        .max_upload_size
        .saturating_add(MULTIPART_OVERHEAD);

    let system = Router::new()
        .route("/health", get(health::health_check))
        .route("/ping", get(health::ping))
        .layer(TimeoutLayer::new(default_timeout));

    // Rotation gets its own, longer deadline instead of the default one
    let rotation = Router::new()
        .route("/rotate-video", post(videos::rotate_video))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn_with_state(state.clone(), extended_timeout));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(system)
        .merge(rotation)
        .layer(from_fn(request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
