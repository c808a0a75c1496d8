// mongobackup/src/backup/s3_upload.rs
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use std::path::Path;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::{AwsSettings, StorageDestination};

/// Object storage operations a backup run needs.
pub trait ObjectStore {
    async fn upload(&self, bucket: &str, key: &str, file_path: &Path) -> Result<()>;

    /// Keys directly under `prefix` (no recursion into deeper "folders").
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    async fn delete_key(&self, bucket: &str, key: &str) -> Result<()>;
}

/// S3 or any S3-compatible service (DigitalOcean Spaces, MinIO, ...).
///
/// The SDK client is built on first use, so runs without a bucket never load AWS
/// configuration.
#[derive(Debug)]
pub struct S3Store {
    aws: AwsSettings,
    client: OnceCell<s3::Client>,
}

impl S3Store {
    pub fn new(aws: &AwsSettings) -> Self {
        S3Store {
            aws: aws.clone(),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> &s3::Client {
        self.client.get_or_init(|| connect(&self.aws)).await
    }
}

/// Static credentials are used when both key id and secret are configured,
/// otherwise the SDK's default provider chain.
async fn connect(aws: &AwsSettings) -> s3::Client {
    let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
    if let Some(region) = &aws.region {
        loader = loader.region(Region::new(region.clone()));
    }
    if let Some(endpoint) = &aws.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
        loader = loader.credentials_provider(s3::config::Credentials::new(
            key_id,
            secret,
            None,     // session_token
            None,     // expiry
            "Static", // provider_name
        ));
    }
    let sdk_config = loader.load().await;

    let s3_config = s3::config::Builder::from(&sdk_config)
        .force_path_style(aws.endpoint_url.is_some())
        .build();
    s3::Client::from_conf(s3_config)
}

impl ObjectStore for S3Store {
    async fn upload(&self, bucket: &str, key: &str, file_path: &Path) -> Result<()> {
        let body = ByteStream::from_path(file_path).await.with_context(|| {
            format!("Failed to create ByteStream from file: {}", file_path.display())
        })?;

        self.client()
            .await
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .with_context(|| {
                format!(
                    "Failed to upload file {} to S3 bucket {} with key {}",
                    file_path.display(),
                    bucket,
                    key
                )
            })?;
        Ok(())
    }

    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;
        loop {
            let page = self
                .client()
                .await
                .list_objects_v2()
                .bucket(bucket)
                .prefix(prefix)
                .delimiter("/")
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .with_context(|| {
                    format!("Failed to list objects in s3://{}/{}", bucket, prefix)
                })?;

            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }
        Ok(keys)
    }

    async fn delete_key(&self, bucket: &str, key: &str) -> Result<()> {
        self.client()
            .await
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("Failed to delete s3://{}/{}", bucket, key))?;
        Ok(())
    }
}

/// Uploads the run's archive under the configured destination.
///
/// Returns the object key, or `None` when no destination is configured.
pub async fn upload_backup<S: ObjectStore>(
    store: &S,
    destination: Option<&StorageDestination>,
    archive_path: &Path,
) -> Result<Option<String>> {
    let Some(destination) = destination else {
        info!("No AWS_BUCKET set.");
        return Ok(None);
    };

    let file_name = archive_path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid archive file name: {}", archive_path.display()))?;
    let key = destination.key_for(file_name);

    info!(
        "Uploading {} to s3://{}/{}",
        archive_path.display(),
        destination.bucket,
        key
    );
    store.upload(&destination.bucket, &key, archive_path).await?;
    info!("✅ Uploaded s3://{}/{}", destination.bucket, key);
    Ok(Some(key))
}
