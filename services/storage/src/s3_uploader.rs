use crate::config::S3Config;
use async_trait::async_trait;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ServerSideEncryption;
use aws_sdk_s3::Client as S3Client;
use mailpipe_pipeline::{AwsConfig, EmailRecord};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Content type of every stored email object
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Errors returned by an object store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to serialize record: {0}")]
    Serialization(String),

    #[error("Failed to upload {key}: {message}")]
    Upload { key: String, message: String },
}

/// Durable key/value blob store
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `body` at `key`, requesting server-side encryption
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;
}

/// S3 uploader for email objects
pub struct S3Uploader {
    client: S3Client,
    bucket: String,
}

impl S3Uploader {
    /// Create a new S3 uploader
    pub async fn new(aws: &AwsConfig, config: &S3Config) -> Self {
        let sdk_config = aws.load_sdk_config().await;

        let mut s3_config_builder = S3ConfigBuilder::from(&sdk_config);

        // Force path-style access for MinIO/LocalStack compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %aws.region,
            "S3 uploader initialized"
        );

        Self {
            client,
            bucket: config.bucket.clone(),
        }
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3Uploader {
    #[instrument(skip(self, body), fields(bucket = %self.bucket, size_bytes = body.len()))]
    async fn put_object(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .server_side_encryption(ServerSideEncryption::Aes256)
            .send()
            .await
            .map_err(|e| StoreError::Upload {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}

/// Writes records to the object store and reports plain success/failure
pub struct StoreWriter {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl StoreWriter {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Store `record` at `key` as pretty-printed JSON.
    ///
    /// Every failure cause (serialization, permissions, network, service
    /// unavailable) is logged and folded into `false`.
    #[instrument(skip(self, record), fields(bucket = %self.bucket))]
    pub async fn store(&self, record: &EmailRecord, key: &str) -> bool {
        match self.try_store(record, key).await {
            Ok(()) => {
                metrics::counter!("s3_uploads_success_total").increment(1);
                info!(s3_key = %key, "Successfully uploaded to S3: s3://{}/{}", self.bucket, key);
                true
            }
            Err(e) => {
                metrics::counter!("s3_uploads_failed_total").increment(1);
                error!(error = %e, s3_key = %key, "Error uploading to S3");
                false
            }
        }
    }

    async fn try_store(&self, record: &EmailRecord, key: &str) -> Result<(), StoreError> {
        let body = record
            .to_pretty_json()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        self.store.put_object(key, body, JSON_CONTENT_TYPE).await
    }
}
