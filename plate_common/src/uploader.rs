//! Best-effort copies of scan artifacts to S3.

use std::path::Path;

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::{Error, Result};

pub fn crop_key(video_stem: &str, crop_file: &str) -> String {
    format!("violations/{video_stem}/{crop_file}")
}

pub fn result_key(result_file: &str) -> String {
    format!("results/{result_file}")
}

pub fn summary_key(summary_file: &str) -> String {
    format!("violations/{summary_file}")
}

#[derive(Clone)]
pub struct S3Uploader {
    client: Client,
    bucket: String,
}

impl S3Uploader {
    /// Credentials and region come from the default AWS provider chain.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self {
            client: Client::new(&sdk_config),
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub async fn upload(&self, local_path: &Path, key: &str) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::Upload(format!("{}: {e}", local_path.display())))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Upload(DisplayErrorContext(e).to_string()))?;
        Ok(())
    }
}

/// Uploader that may be switched off by configuration.
#[derive(Clone, Default)]
pub struct ArtifactUploader {
    inner: Option<S3Uploader>,
}

impl ArtifactUploader {
    pub async fn from_config(storage: &StorageConfig) -> Self {
        match &storage.bucket {
            Some(bucket) => Self {
                inner: Some(S3Uploader::from_env(bucket.clone()).await),
            },
            None => Self::disabled(),
        }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Never fails: upload errors are logged and swallowed.
    pub async fn upload_best_effort(&self, local_path: &Path, key: &str) -> bool {
        let Some(uploader) = &self.inner else {
            debug!(key, "no bucket configured, skipping upload");
            return false;
        };
        match uploader.upload(local_path, key).await {
            Ok(()) => {
                info!(bucket = uploader.bucket(), key, "uploaded artifact");
                true
            }
            Err(e) => {
                warn!(path = %local_path.display(), key, error = %e, "upload failed");
                false
            }
        }
    }
}
