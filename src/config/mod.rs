use crate::utils::validation::MAX_UPLOAD_SIZE;
use std::env;
use std::path::PathBuf;

/// Remote object storage settings
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3-compatible endpoint; `None` uses the SDK default resolution
    pub endpoint: Option<String>,

    /// Region passed to the SDK (default: "us-east-1")
    pub region: String,

    /// Static credentials. When absent the SDK credential chain is used.
    pub access_key: Option<String>,
    pub secret_key: Option<String>,

    /// Target bucket
    pub bucket: String,

    /// Prefix for published object keys (default: "rotated-videos")
    pub object_prefix: String,

    /// Base of the public URL template `{base}/{bucket}/{key}`
    pub public_url_base: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            bucket: "videos".to_string(),
            object_prefix: "rotated-videos".to_string(),
            public_url_base: "https://storage.googleapis.com".to_string(),
        }
    }
}

/// Configuration for the video rotation service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum upload size in bytes (default: 100 MB)
    pub max_upload_size: usize,

    /// Local scratch directory for staged uploads and transcode output (default: "temp")
    pub temp_dir: PathBuf,

    /// Interval between scheduled sweeps in seconds (default: 900)
    pub sweep_interval_secs: u64,

    /// Scratch files older than this are swept (default: 60)
    pub sweep_max_age_minutes: u64,

    /// Also queue a background sweep whenever a rotation request starts (default: true)
    pub sweep_on_request: bool,

    /// Deadline for the rotate-video route in seconds (default: 600)
    pub rotation_timeout_secs: u64,

    /// Deadline for every other route in seconds (default: 30)
    pub default_timeout_secs: u64,

    /// ffmpeg binary (default: "ffmpeg")
    pub ffmpeg_path: String,

    /// ffprobe binary (default: "ffprobe")
    pub ffprobe_path: String,

    pub storage: StorageConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_upload_size: MAX_UPLOAD_SIZE,
            temp_dir: PathBuf::from("temp"),
            sweep_interval_secs: 15 * 60,
            sweep_max_age_minutes: 60,
            sweep_on_request: true,
            rotation_timeout_secs: 600,
            default_timeout_secs: 30,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_upload_size: env::var("MAX_UPLOAD_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_upload_size),

            temp_dir: env::var("TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.temp_dir),

            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v: &u64| *v > 0)
                .unwrap_or(default.sweep_interval_secs),

            sweep_max_age_minutes: env::var("SWEEP_MAX_AGE_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.sweep_max_age_minutes),

            sweep_on_request: env::var("SWEEP_ON_REQUEST")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(default.sweep_on_request),

            rotation_timeout_secs: env::var("ROTATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.rotation_timeout_secs),

            default_timeout_secs: env::var("DEFAULT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.default_timeout_secs),

            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or(default.ffmpeg_path),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or(default.ffprobe_path),

            storage: StorageConfig {
                endpoint: env::var("STORAGE_ENDPOINT").ok(),
                region: env::var("STORAGE_REGION").unwrap_or(default.storage.region),
                access_key: env::var("STORAGE_ACCESS_KEY").ok(),
                secret_key: env::var("STORAGE_SECRET_KEY").ok(),
                bucket: env::var("STORAGE_BUCKET").unwrap_or(default.storage.bucket),
                object_prefix: env::var("STORAGE_OBJECT_PREFIX")
                    .unwrap_or(default.storage.object_prefix),
                public_url_base: env::var("STORAGE_PUBLIC_URL_BASE")
                    .unwrap_or(default.storage.public_url_base),
            },
        }
    }

    /// Create config for local development (short sweeps, local MinIO)
    pub fn development() -> Self {
        Self {
            sweep_interval_secs: 60,
            sweep_max_age_minutes: 10,
            storage: StorageConfig {
                endpoint: Some("http://127.0.0.1:9000".to_string()),
                access_key: Some("minioadmin".to_string()),
                secret_key: Some("minioadmin".to_string()),
                public_url_base: "http://127.0.0.1:9000".to_string(),
                ..StorageConfig::default()
            },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(config.sweep_max_age_minutes, 60);
        assert_eq!(config.rotation_timeout_secs, 600);
        assert!(config.sweep_on_request);
        assert_eq!(config.storage.object_prefix, "rotated-videos");
    }

    #[test]
    fn test_development_config() {
        let config = ServiceConfig::development();
        assert_eq!(config.sweep_max_age_minutes, 10);
        assert_eq!(
            config.storage.endpoint.as_deref(),
            Some("http://127.0.0.1:9000")
        );
        // Limits stay at the production values
        assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
    }
}
