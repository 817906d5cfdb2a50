use crate::api::error::AppError;
use crate::models::StagedAsset;
use crate::utils::validation::{ValidationError, file_stem, sanitize_filename, validate_file_size};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Container extension of every transcoded output
pub const OUTPUT_EXTENSION: &str = "mp4";

const COPY_BUFFER_SIZE: usize = 256 * 1024;

/// Local scratch space for in-flight uploads and transcode output.
///
/// Every file it names is prefixed with a millisecond stamp drawn from a
/// strictly increasing counter, so concurrent uploads sharing an original
/// name never resolve to the same path.
pub struct StagingArea {
    dir: PathBuf,
    max_upload_size: usize,
    last_stamp: AtomicI64,
}

impl StagingArea {
    /// Opens (creating if needed) the scratch directory.
    pub async fn open(dir: impl Into<PathBuf>, max_upload_size: usize) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            max_upload_size,
            last_stamp: AtomicI64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Wall-clock milliseconds, bumped past the previous stamp when two
    /// callers land in the same millisecond.
    pub fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut prev = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self.last_stamp.compare_exchange_weak(
                prev,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Streams `reader` into `{dir}/{stamp}_{name}`.
    ///
    /// The byte count is enforced while copying; an oversized or broken
    /// stream leaves nothing behind.
    pub async fn stage<R>(
        &self,
        original_name: &str,
        mime_type: &str,
        mut reader: R,
    ) -> Result<StagedAsset, AppError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let name = sanitize_filename(original_name).map_err(validation_error)?;
        let stamp = self.next_stamp();
        let path = self.dir.join(format!("{}_{}", stamp, name));

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                AppError::Internal(format!("Failed to create {}: {}", path.display(), e))
            })?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total: usize = 0;

        let copied: Result<(), AppError> = async {
            loop {
                let n = reader
                    .read(&mut buffer)
                    .await
                    .map_err(|e| upload_stream_error(e, self.max_upload_size))?;
                if n == 0 {
                    break;
                }
                total += n;
                validate_file_size(total, self.max_upload_size)
                    .map_err(|e| AppError::PayloadTooLarge(e.to_string()))?;
                file.write_all(&buffer[..n])
                    .await
                    .map_err(|e| AppError::Internal(format!("Failed to write upload: {}", e)))?;
            }
            file.flush()
                .await
                .map_err(|e| AppError::Internal(format!("Failed to flush upload: {}", e)))?;
            Ok::<(), AppError>(())
        }
        .await;

        drop(file);

        if let Err(e) = copied {
            if let Err(remove_err) = fs::remove_file(&path).await {
                tracing::warn!(
                    "Failed to remove partial upload {}: {}",
                    path.display(),
                    remove_err
                );
            }
            return Err(e);
        }

        if total == 0 {
            if let Err(remove_err) = fs::remove_file(&path).await {
                tracing::warn!(
                    "Failed to remove empty upload {}: {}",
                    path.display(),
                    remove_err
                );
            }
            return Err(AppError::Validation("Uploaded video is empty".to_string()));
        }

        tracing::info!("📥 Staged {} ({} bytes) at {}", name, total, path.display());

        Ok(StagedAsset {
            path,
            original_name: original_name.to_string(),
            mime_type: mime_type.to_string(),
            size_bytes: total as u64,
            created_at: Utc::now(),
            stamp,
        })
    }

    /// Scratch path the transcoder writes for `asset`:
    /// `rotated_{stamp}_{stem}.mp4` next to the staged input.
    pub fn output_path_for(&self, asset: &StagedAsset) -> PathBuf {
        let stem = asset
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split_once('_').map(|(_, rest)| rest))
            .map(file_stem)
            .unwrap_or_else(|| file_stem(&asset.original_name));

        self.dir.join(format!(
            "rotated_{}_{}.{}",
            asset.stamp, stem, OUTPUT_EXTENSION
        ))
    }
}

fn validation_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<ValidationError>() {
        Some(v) => AppError::Validation(v.message.clone()),
        None => AppError::Validation(e.to_string()),
    }
}

fn upload_stream_error(e: std::io::Error, max: usize) -> AppError {
    let msg = e.to_string();
    if msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge(format!(
            "Upload exceeds the maximum allowed {} MB",
            max / 1024 / 1024
        ))
    } else {
        AppError::Validation(format!("Upload stream interrupted: {}", msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    async fn count_entries(dir: &Path) -> usize {
        let mut entries = fs::read_dir(dir).await.unwrap();
        let mut n = 0;
        while entries.next_entry().await.unwrap().is_some() {
            n += 1;
        }
        n
    }

    #[tokio::test]
    async fn test_stage_writes_namespaced_file() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(tmp.path().join("temp"), 1024).await.unwrap();

        let asset = staging
            .stage("clip.mp4", "video/mp4", &b"fake video bytes"[..])
            .await
            .unwrap();

        assert_eq!(asset.size_bytes, 16);
        assert_eq!(asset.original_name, "clip.mp4");
        let name = asset.path.file_name().unwrap().to_str().unwrap();
        assert_eq!(name, format!("{}_clip.mp4", asset.stamp));
        assert_eq!(fs::read(&asset.path).await.unwrap(), b"fake video bytes");
    }

    #[tokio::test]
    async fn test_oversized_upload_leaves_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(tmp.path(), 8).await.unwrap();

        let err = staging
            .stage("big.mp4", "video/mp4", &[0u8; 64][..])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PayloadTooLarge(_)));
        assert_eq!(count_entries(tmp.path()).await, 0);
    }

    #[tokio::test]
    async fn test_empty_upload_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(tmp.path(), 8).await.unwrap();

        let err = staging.stage("e.mp4", "video/mp4", &b""[..]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(count_entries(tmp.path()).await, 0);
    }

    #[tokio::test]
    async fn test_same_name_concurrent_uploads_get_distinct_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = Arc::new(StagingArea::open(tmp.path(), 1024).await.unwrap());

        let a = {
            let staging = staging.clone();
            tokio::spawn(async move { staging.stage("same.mp4", "video/mp4", &b"a"[..]).await })
        };
        let b = {
            let staging = staging.clone();
            tokio::spawn(async move { staging.stage("same.mp4", "video/mp4", &b"b"[..]).await })
        };

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_ne!(a.stamp, b.stamp);
        assert_ne!(a.path, b.path);
        assert_eq!(count_entries(tmp.path()).await, 2);
    }

    #[tokio::test]
    async fn test_stamps_strictly_increase() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(tmp.path(), 1).await.unwrap();

        let stamps: Vec<i64> = (0..1000).map(|_| staging.next_stamp()).collect();
        assert!(stamps.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(stamps.iter().collect::<HashSet<_>>().len(), 1000);
    }

    #[tokio::test]
    async fn test_output_path_derivation() {
        let tmp = tempfile::tempdir().unwrap();
        let staging = StagingArea::open(tmp.path(), 1024).await.unwrap();
        let asset = staging
            .stage("my_holiday.mov", "video/quicktime", &b"x"[..])
            .await
            .unwrap();

        let out = staging.output_path_for(&asset);
        assert_eq!(
            out.file_name().unwrap().to_str().unwrap(),
            format!("rotated_{}_my_holiday.mp4", asset.stamp)
        );
        assert_eq!(out.parent(), Some(tmp.path()));
    }
}
