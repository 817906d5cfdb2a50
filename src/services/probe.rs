//! Container metadata extraction via ffprobe.

use crate::api::error::AppError;
use crate::models::VideoMetadata;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

#[async_trait]
pub trait MetadataInspector: Send + Sync {
    /// Reads resolution and rotation of the first video stream.
    async fn inspect(&self, path: &Path) -> Result<VideoMetadata, AppError>;
}

pub struct FfprobeInspector {
    ffprobe_path: String,
}

impl FfprobeInspector {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    #[serde(default)]
    tags: Option<StreamTags>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
}

#[derive(Debug, Deserialize)]
struct StreamTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[async_trait]
impl MetadataInspector for FfprobeInspector {
    async fn inspect(&self, path: &Path) -> Result<VideoMetadata, AppError> {
        if !path.exists() {
            return Err(AppError::MetadataUnreadable(format!(
                "{} does not exist",
                path.display()
            )));
        }

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AppError::MetadataUnreadable(format!(
                    "Failed to run {}: {}",
                    self.ffprobe_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(AppError::MetadataUnreadable(format!(
                "ffprobe exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let metadata = parse_probe_output(&output.stdout).map_err(AppError::MetadataUnreadable)?;

        tracing::debug!(
            "Probed {}: {}x{} rotation={}",
            path.display(),
            metadata.width_px,
            metadata.height_px,
            metadata.rotation_degrees
        );

        Ok(metadata)
    }
}

/// Extracts [`VideoMetadata`] from `ffprobe -print_format json -show_streams`.
///
/// The legacy `rotate` stream tag wins when present. Otherwise the display
/// matrix rotation is used, negated because ffprobe reports it
/// counter-clockwise while the tag is clockwise.
pub fn parse_probe_output(stdout: &[u8]) -> Result<VideoMetadata, String> {
    let probe: ProbeOutput =
        serde_json::from_slice(stdout).map_err(|e| format!("Invalid ffprobe output: {}", e))?;

    let stream = probe
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().is_none_or(|t| t == "video"))
        .ok_or_else(|| "No video stream found".to_string())?;

    let (width_px, height_px) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err("Video stream has no resolution".to_string()),
    };

    let tagged = stream
        .tags
        .and_then(|t| t.rotate)
        .and_then(|r| r.trim().parse::<i32>().ok());

    let matrix = stream
        .side_data_list
        .iter()
        .find_map(|d| d.rotation)
        .map(|r| -((r.round() as i32) % 360));

    let rotation_degrees = tagged.or(matrix).unwrap_or(0).rem_euclid(360);

    Ok(VideoMetadata {
        width_px,
        height_px,
        rotation_degrees,
    })
}
