//! S3 state store using the AWS SDK.
//!
//! The SDK is async; this store owns a current-thread tokio runtime and
//! blocks on every call so callers stay fully sequential.

use super::StateStore;
use crate::BackendSettings;
use crate::error::{Error, Result};
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use tokio::runtime::Runtime;

/// State store backed by an S3 bucket.
///
/// Credentials come from the default AWS provider chain.
pub struct S3Store {
    runtime: Runtime,
    client: Client,
    bucket: String,
}

impl S3Store {
    /// Open a session for the bucket and region in `settings`.
    pub fn connect(settings: &BackendSettings) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Session {
                message: format!("failed to start runtime: {e}"),
            })?;

        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(settings.region.clone()))
                .load(),
        );

        log::debug!(
            "opened s3 session for bucket {} in {}",
            settings.bucket,
            settings.region
        );

        Ok(Self {
            runtime,
            client: Client::new(&config),
            bucket: settings.bucket.clone(),
        })
    }
}

impl std::fmt::Debug for S3Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl StateStore for S3Store {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(value.to_vec()))
            .send();

        self.runtime
            .block_on(request)
            .map_err(|e| Error::Put {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send();

        let output = self.runtime.block_on(request).map_err(|e| {
            if matches!(e.as_service_error(), Some(GetObjectError::NoSuchKey(_))) {
                Error::NotFound(key.to_string())
            } else {
                Error::Get {
                    key: key.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                }
            }
        })?;

        let body = self
            .runtime
            .block_on(output.body.collect())
            .map_err(|e| Error::Get {
                key: key.to_string(),
                message: format!("failed to read the body: {e}"),
            })?;

        Ok(body.into_bytes().to_vec())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let request = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send();

        self.runtime
            .block_on(request)
            .map_err(|e| Error::Delete {
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
