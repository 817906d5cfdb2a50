use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// An inbound upload written to local scratch space.
///
/// Owned by the request that staged it until the paths are handed to the
/// cleanup machinery.
#[derive(Debug, Clone)]
pub struct StagedAsset {
    pub path: PathBuf,
    pub original_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
    /// Millisecond stamp that namespaces this asset's scratch files
    pub stamp: i64,
}

/// Container-level view of a video file. Rotation is 0 when untagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VideoMetadata {
    pub width_px: u32,
    pub height_px: u32,
    pub rotation_degrees: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeResult {
    pub output_path: PathBuf,
    pub output_width_px: u32,
    pub output_height_px: u32,
}

/// The only artifact of a rotation request that outlives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PublishedObject {
    pub bucket_key: String,
    pub public_url: String,
}

/// Sweep parameters for one scratch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupTask {
    pub directory: PathBuf,
    pub max_age_minutes: u64,
}

impl CleanupTask {
    pub fn new(directory: impl Into<PathBuf>, max_age_minutes: u64) -> Self {
        Self {
            directory: directory.into(),
            max_age_minutes,
        }
    }
}
