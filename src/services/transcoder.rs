//! Drives ffmpeg to bake a [`TransformPlan`] into the pixels.

use crate::api::error::AppError;
use crate::models::{TranscodeResult, VideoMetadata};
use crate::services::probe::MetadataInspector;
use crate::services::rotation::{TransformOp, TransformPlan, TransposeDirection};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// How much of ffmpeg's stderr is kept in a failure message
const STDERR_TAIL_BYTES: usize = 2048;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Writes `output` with `plan` applied. The source metadata is the
    /// inspector's view of `input`.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        source: &VideoMetadata,
        plan: &TransformPlan,
    ) -> Result<TranscodeResult, AppError>;
}

/// Builder for a single-input, single-output ffmpeg invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: PathBuf,
    output: PathBuf,
    /// Arguments placed before -i
    input_args: Vec<String>,
    /// Arguments placed after -i
    output_args: Vec<String>,
    log_level: String,
}

impl FfmpegCommand {
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            log_level: "error".to_string(),
        }
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Applies `plan` to the command line. This is the only place the plan
    /// is turned into ffmpeg syntax.
    pub fn transform(self, plan: &TransformPlan) -> Self {
        // The plan is the only rotation applied; ffmpeg must not also honor the tag.
        let mut cmd = self.input_arg("-noautorotate");

        if let Some(graph) = filter_graph(plan) {
            cmd = cmd.video_filter(graph);
        }
        if plan.clear_rotation_flag {
            cmd = cmd.output_arg("-metadata:s:v:0").output_arg("rotate=0");
        }
        cmd
    }

    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            self.log_level.clone(),
        ];
        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());
        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Comma-joined filter chain for the plan, `None` when there is nothing to do.
pub fn filter_graph(plan: &TransformPlan) -> Option<String> {
    if plan.is_identity() {
        return None;
    }
    let filters: Vec<&str> = plan
        .operations
        .iter()
        .map(|op| match op {
            TransformOp::Transpose(TransposeDirection::Clockwise) => "transpose=1",
            TransformOp::Transpose(TransposeDirection::CounterClockwise) => "transpose=2",
            TransformOp::FlipHorizontal => "hflip",
            TransformOp::FlipVertical => "vflip",
        })
        .collect();
    Some(filters.join(","))
}

/// ffmpeg-backed [`Transcoder`] producing H.264/AAC MP4.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    inspector: Arc<dyn MetadataInspector>,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>, inspector: Arc<dyn MetadataInspector>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            inspector,
        }
    }

    pub fn command(input: &Path, output: &Path, plan: &TransformPlan) -> FfmpegCommand {
        FfmpegCommand::new(input, output)
            .transform(plan)
            .video_codec("libx264")
            .output_arg("-pix_fmt")
            .output_arg("yuv420p")
            .audio_codec("aac")
            .output_arg("-movflags")
            .output_arg("+faststart")
            .format("mp4")
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        source: &VideoMetadata,
        plan: &TransformPlan,
    ) -> Result<TranscodeResult, AppError> {
        let args = Self::command(input, output, plan).build_args();
        tracing::info!(
            "🎬 Transcoding {} ({} ops)",
            input.display(),
            plan.operations.len()
        );
        tracing::debug!("Running: {} {}", self.ffmpeg_path, args.join(" "));

        // Not killed on drop: an abandoned transcode runs to completion and
        // its output is left for the sweep.
        let result = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                AppError::TranscodeFailed(format!("Failed to run {}: {}", self.ffmpeg_path, e))
            })?;

        if !result.status.success() {
            return Err(AppError::TranscodeFailed(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr_tail(&result.stderr)
            )));
        }

        ensure_output(output).await?;

        let expected = plan.output_dimensions(source.width_px, source.height_px);
        let transcoded = TranscodeResult {
            output_path: output.to_path_buf(),
            output_width_px: expected.0,
            output_height_px: expected.1,
        };
        verify_output(self.inspector.as_ref(), &transcoded).await;

        tracing::info!("✅ Transcode completed: {}", output.display());
        Ok(transcoded)
    }
}

/// Fails unless `output` exists and is non-empty.
pub async fn ensure_output(output: &Path) -> Result<(), AppError> {
    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
        Ok(_) => Err(AppError::TranscodeFailed(format!(
            "{} is empty",
            output.display()
        ))),
        Err(_) => Err(AppError::TranscodeFailed(format!(
            "No output file produced at {}",
            output.display()
        ))),
    }
}

/// Re-probes the output and logs what it finds. Never fails the request.
pub async fn verify_output(inspector: &dyn MetadataInspector, result: &TranscodeResult) -> bool {
    match inspector.inspect(&result.output_path).await {
        Ok(meta) => {
            let matches = meta.width_px == result.output_width_px
                && meta.height_px == result.output_height_px
                && meta.rotation_degrees == 0;
            if matches {
                tracing::info!(
                    "Output verified: {}x{} rotation=0",
                    meta.width_px,
                    meta.height_px
                );
            } else {
                tracing::warn!(
                    "Output mismatch: expected {}x{} rotation=0, got {}x{} rotation={}",
                    result.output_width_px,
                    result.output_height_px,
                    meta.width_px,
                    meta.height_px,
                    meta.rotation_degrees
                );
            }
            matches
        }
        Err(e) => {
            tracing::warn!("Could not verify output dimensions: {}", e);
            false
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
