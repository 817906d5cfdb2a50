use crate::api::error::AppError;
use crate::models::{PublishedObject, TranscodeResult};
use crate::services::storage::ObjectStore;
use chrono::Utc;
use std::sync::Arc;

pub const OUTPUT_CONTENT_TYPE: &str = "video/mp4";

/// Uploads transcoded files under a fixed key prefix and derives their
/// public URL.
pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    object_prefix: String,
    public_url_base: String,
}

impl Publisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        object_prefix: impl Into<String>,
        public_url_base: impl Into<String>,
    ) -> Self {
        Self {
            store,
            object_prefix: object_prefix.into(),
            public_url_base: public_url_base.into(),
        }
    }

    /// `{prefix}/{timestamp_ms}_{file_name}`
    pub fn object_key(&self, timestamp_ms: i64, file_name: &str) -> String {
        let prefix = self.object_prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}_{}", timestamp_ms, file_name)
        } else {
            format!("{}/{}_{}", prefix, timestamp_ms, file_name)
        }
    }

    /// `{base}/{bucket}/{key}`
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.public_url_base.trim_end_matches('/'),
            self.store.bucket(),
            key
        )
    }

    pub async fn publish(&self, result: &TranscodeResult) -> Result<PublishedObject, AppError> {
        let file_name = result
            .output_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                AppError::PublishFailed(format!(
                    "Output path {} has no file name",
                    result.output_path.display()
                ))
            })?;

        let key = self.object_key(Utc::now().timestamp_millis(), file_name);

        self.store
            .put_file(&key, &result.output_path, OUTPUT_CONTENT_TYPE)
            .await
            .map_err(|e| AppError::PublishFailed(format!("{:#}", e)))?;

        tracing::info!("☁️  Video uploaded to storage: {}", key);

        Ok(PublishedObject {
            public_url: self.public_url(&key),
            bucket_key: key,
        })
    }
}
