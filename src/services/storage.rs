use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use std::path::Path;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Single-shot, non-resumable upload of a local file.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()>;
    async fn file_exists(&self, key: &str) -> Result<bool>;
    fn bucket(&self) -> &str;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<()> {
        let size = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("Cannot stat {}", path.display()))?
            .len();

        // Streams from disk; the body is never buffered whole in memory
        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Cannot open {}", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(e.into_service_error()))
            .with_context(|| format!("PutObject {}/{} failed", self.bucket, key))?;
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
