//! Test doubles: a "video" here is a JSON-encoded `VideoMetadata`, so the
//! full pipeline can run without ffmpeg or a bucket.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, body::Body, http::Request};
use rust_video_backend::api::error::AppError;
use rust_video_backend::config::ServiceConfig;
use rust_video_backend::models::{TranscodeResult, VideoMetadata};
use rust_video_backend::services::cleanup::BackgroundCleanup;
use rust_video_backend::services::probe::MetadataInspector;
use rust_video_backend::services::publisher::Publisher;
use rust_video_backend::services::rotation::TransformPlan;
use rust_video_backend::services::rotation_service::RotationService;
use rust_video_backend::services::staging::StagingArea;
use rust_video_backend::services::storage::ObjectStore;
use rust_video_backend::services::transcoder::Transcoder;
use rust_video_backend::{AppState, create_app};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const BOUNDARY: &str = "---------------------------rotationtestboundary";
pub const BUCKET: &str = "test-bucket";
pub const PUBLIC_BASE: &str = "https://cdn.example.test";

pub fn fake_video(width_px: u32, height_px: u32, rotation_degrees: i32) -> Vec<u8> {
    serde_json::to_vec(&VideoMetadata {
        width_px,
        height_px,
        rotation_degrees,
    })
    .unwrap()
}

pub struct JsonInspector;

#[async_trait]
impl MetadataInspector for JsonInspector {
    async fn inspect(&self, path: &Path) -> Result<VideoMetadata, AppError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::MetadataUnreadable(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| AppError::MetadataUnreadable(e.to_string()))
    }
}

/// Applies the plan's dimension change and writes an upright result.
pub struct JsonTranscoder {
    pub delay: Duration,
}

impl Default for JsonTranscoder {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl Transcoder for JsonTranscoder {
    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        source: &VideoMetadata,
        plan: &TransformPlan,
    ) -> Result<TranscodeResult, AppError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let (width, height) = plan.output_dimensions(source.width_px, source.height_px);
        tokio::fs::write(output, fake_video(width, height, 0))
            .await
            .map_err(|e| AppError::TranscodeFailed(e.to_string()))?;
        Ok(TranscodeResult {
            output_path: output.to_path_buf(),
            output_width_px: width,
            output_height_px: height,
        })
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    pub fail: AtomicBool,
}

impl MemoryObjectStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn get(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.objects.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        let bytes = tokio::fs::read(path).await?;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> anyhow::Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    fn bucket(&self) -> &str {
        BUCKET
    }
}

pub struct TestApp {
    pub app: Router,
    pub temp_dir: PathBuf,
    pub store: Arc<MemoryObjectStore>,
}

pub async fn build_app(
    temp_dir: &Path,
    store: Arc<MemoryObjectStore>,
    transcoder: JsonTranscoder,
    tweak: impl FnOnce(&mut ServiceConfig),
) -> TestApp {
    let mut config = ServiceConfig {
        temp_dir: temp_dir.to_path_buf(),
        sweep_on_request: false,
        ..ServiceConfig::default()
    };
    config.storage.public_url_base = PUBLIC_BASE.to_string();
    tweak(&mut config);

    let staging = Arc::new(
        StagingArea::open(&config.temp_dir, config.max_upload_size)
            .await
            .unwrap(),
    );
    let (cleanup, _supervisor) = BackgroundCleanup::start();
    let publisher = Publisher::new(
        store.clone(),
        config.storage.object_prefix.clone(),
        config.storage.public_url_base.clone(),
    );
    let mut rotation = RotationService::new(
        staging,
        Arc::new(JsonInspector),
        Arc::new(transcoder),
        publisher,
        cleanup,
    );
    if config.sweep_on_request {
        rotation = rotation.with_request_sweep(config.sweep_max_age_minutes);
    }

    let state = AppState {
        config,
        storage: store.clone(),
        rotation: Arc::new(rotation),
    };

    TestApp {
        app: create_app(state),
        temp_dir: temp_dir.to_path_buf(),
        store,
    }
}

pub fn multipart_request(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
        Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/rotate-video")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Waits for background cleanup to empty `dir`.
pub async fn wait_until_empty(dir: &Path) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let names = dir_entries(dir);
        if names.is_empty() || tokio::time::Instant::now() >= deadline {
            return names;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Writes `name` into `dir` with an mtime `age` in the past.
pub fn write_aged(dir: &Path, name: &str, age: Duration) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"scratch").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(std::time::SystemTime::now() - age)
        .unwrap();
    path
}
