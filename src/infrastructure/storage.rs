use crate::config::StorageConfig;
use crate::services::storage::S3ObjectStore;
use aws_sdk_s3::config::Region;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn setup_storage(config: &StorageConfig) -> anyhow::Result<Arc<S3ObjectStore>> {
    if config.bucket.trim().is_empty() {
        anyhow::bail!("STORAGE_BUCKET must not be empty");
    }

    info!(
        "☁️  Object Storage: {} (Bucket: {})",
        config.endpoint.as_deref().unwrap_or("<sdk default>"),
        config.bucket
    );

    let mut loader = aws_config::from_env().region(Region::new(config.region.clone()));
    if let Some(endpoint) = &config.endpoint {
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        loader = loader.credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key.clone(),
            secret_key.clone(),
            None,
            None,
            "static",
        ));
    }
    let aws_config = loader.load().await;

    // Self-hosted S3 clones generally don't do virtual-hosted buckets
    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(config.endpoint.is_some())
        .build();
    let client = aws_sdk_s3::Client::from_conf(s3_config);

    if let Err(e) = client.head_bucket().bucket(&config.bucket).send().await {
        warn!(
            "Bucket {} is not reachable yet: {}",
            config.bucket,
            e.into_service_error()
        );
    }

    Ok(Arc::new(S3ObjectStore::new(client, config.bucket.clone())))
}
