//! Shared S3 client for S3-backed origins.

use crate::error::{SourceError, SourceResult};
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::sync::OnceCell;

/// A lazily initialized S3 client.
///
/// Construction is deferred to the first origin fetch so that building a
/// source (and therefore the registry) never blocks on the AWS credential
/// chain. Credentials, region, and endpoint come from the ambient AWS
/// environment.
#[derive(Debug, Default)]
pub struct S3Handle {
    client: OnceCell<Client>,
}

impl S3Handle {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client(&self) -> &Client {
        self.client
            .get_or_init(|| async {
                let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
                Client::new(&config)
            })
            .await
    }

    /// The object's current ETag. A missing bucket or key is the no-data
    /// condition, not an error.
    pub async fn etag(&self, bucket: &str, key: &str) -> SourceResult<String> {
        let output = self
            .client()
            .await
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket, key))?;
        output
            .e_tag()
            .map(str::to_string)
            .ok_or_else(|| SourceError::S3(format!("no ETag on s3://{bucket}/{key}").into()))
    }

    /// Fetch an object's full content.
    pub async fn get(&self, bucket: &str, key: &str) -> SourceResult<Bytes> {
        let output = self
            .client()
            .await
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, bucket, key))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| SourceError::S3(Box::new(e)))?;
        Ok(data.into_bytes())
    }
}

fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, bucket: &str, key: &str) -> SourceError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
        if service_err.raw().status().as_u16() == 404 {
            return SourceError::NoData(format!("s3://{bucket}/{key}"));
        }
    }
    SourceError::S3(Box::new(err))
}
