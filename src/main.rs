use clap::{Parser, ValueEnum};
use dotenvy::dotenv;
use rust_video_backend::config::ServiceConfig;
use rust_video_backend::infrastructure::storage;
use rust_video_backend::models::CleanupTask;
use rust_video_backend::services::cleanup::BackgroundCleanup;
use rust_video_backend::services::probe::FfprobeInspector;
use rust_video_backend::services::publisher::Publisher;
use rust_video_backend::services::rotation_service::RotationService;
use rust_video_backend::services::staging::StagingArea;
use rust_video_backend::services::transcoder::FfmpegTranscoder;
use rust_video_backend::services::worker::CleanupScheduler;
use rust_video_backend::{AppState, create_app};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long shutdown waits for queued cleanup jobs
const CLEANUP_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HTTP API only
    Api,
    /// Periodic scratch sweep only
    Sweeper,
    /// Both
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Service type to run
    #[arg(short, long, value_enum, default_value_t = Mode::All)]
    mode: Mode,

    /// Port for the API server
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_video_backend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🚀 Starting Rust Video Backend [Mode: {:?}]...", args.mode);

    let config = ServiceConfig::from_env();
    info!(
        "⚙️  Config: Max Size={}MB, Temp Dir={}, Sweep every {}s (max age {} min), Rotation timeout={}s",
        config.max_upload_size / 1024 / 1024,
        config.temp_dir.display(),
        config.sweep_interval_secs,
        config.sweep_max_age_minutes,
        config.rotation_timeout_secs
    );

    let staging = Arc::new(StagingArea::open(&config.temp_dir, config.max_upload_size).await?);

    let scheduler = if matches!(args.mode, Mode::Sweeper | Mode::All) {
        let task = CleanupTask::new(staging.dir(), config.sweep_max_age_minutes);
        info!("👷 Sweeper initialized.");
        Some(CleanupScheduler::start(
            task,
            Duration::from_secs(config.sweep_interval_secs),
        ))
    } else {
        None
    };

    let served = if matches!(args.mode, Mode::Api | Mode::All) {
        serve_api(config, staging, args.port).await
    } else {
        shutdown_signal().await;
        Ok(())
    };

    info!("🛑 Shutting down backend services...");
    if let Some(scheduler) = scheduler {
        scheduler.stop().await;
    }

    served?;
    info!("👋 Backend exited cleanly.");
    Ok(())
}

async fn serve_api(config: ServiceConfig, staging: Arc<StagingArea>, port: u16) -> anyhow::Result<()> {
    let store = storage::setup_storage(&config.storage).await?;

    for tool in [&config.ffmpeg_path, &config.ffprobe_path] {
        if which::which(tool).is_err() {
            warn!("⚠️  {} not found on PATH; rotation requests will fail", tool);
        }
    }

    let (cleanup, cleanup_supervisor) = BackgroundCleanup::start();

    let inspector = Arc::new(FfprobeInspector::new(config.ffprobe_path.clone()));
    let transcoder = Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path.clone(),
        inspector.clone(),
    ));
    let publisher = Publisher::new(
        store.clone(),
        config.storage.object_prefix.clone(),
        config.storage.public_url_base.clone(),
    );

    let mut rotation = RotationService::new(staging, inspector, transcoder, publisher, cleanup);
    if config.sweep_on_request {
        rotation = rotation.with_request_sweep(config.sweep_max_age_minutes);
    }

    let state = AppState {
        config,
        storage: store,
        rotation: Arc::new(rotation),
    };

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &axum::http::Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown");
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = %request_id,
            )
        })
        .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
            info!("📥 {} {}", request.method(), request.uri());
        })
        .on_response(
            |response: &axum::http::Response<_>, latency: Duration, _span: &tracing::Span| {
                info!(
                    "📤 Finished in {:?} with status {}",
                    latency,
                    response.status()
                );
            },
        );

    let app = create_app(state).layer(trace_layer);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("✅ API Server listening on: http://0.0.0.0:{}", port);
    info!("📖 Swagger UI documentation: http://localhost:{}/swagger-ui", port);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    if let Err(e) = &served {
        error!("❌ Server runtime error: {}", e);
    }

    // The app (and every cleanup handle in it) is gone, so the executor
    // drains what is queued and exits.
    match tokio::time::timeout(CLEANUP_DRAIN_TIMEOUT, cleanup_supervisor).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Cleanup executor ended abnormally: {}", e),
        Err(_) => warn!("Cleanup executor did not drain within {:?}", CLEANUP_DRAIN_TIMEOUT),
    }

    served.map_err(Into::into)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("⌨️  Ctrl+C received, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("💤 SIGTERM received, initiating graceful shutdown...");
        },
    }
}
