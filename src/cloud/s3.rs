use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use log::{debug, info, warn};
use rusoto_core::{ByteStream, Region, RusotoError};
use rusoto_s3::{
    DeleteObjectRequest, HeadBucketError, HeadBucketRequest, PutObjectRequest, S3Client, S3,
};
use serde::{Deserialize, Serialize};
use tokio_util::codec::{BytesCodec, FramedRead};

use crate::cloud::client::{create_s3_client, resolve_region};
use crate::cloud::sink::{ObjectBody, ObjectStoreSink, SinkError};

/// Configuration for an S3 (or S3-compatible) connection
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct S3Config {
    /// AWS region name, e.g. "us-east-1"
    #[serde(default)]
    pub region: Option<String>,
    /// Named profile from the shared credentials file
    #[serde(default)]
    pub profile: Option<String>,
    /// Endpoint URL for S3-compatible stores
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

impl fmt::Debug for S3Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<REDACTED>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Object store sink backed by rusoto's S3 client.
pub struct S3Sink {
    client: S3Client,
    region: Region,
}

impl S3Sink {
    pub fn new(client: S3Client, region: Region) -> Self {
        Self { client, region }
    }

    /// Build the client described by `config`
    pub fn from_config(config: &S3Config) -> Result<Self> {
        let client = create_s3_client(config)?;
        Ok(Self::new(client, resolve_region(config)))
    }
}

/// Classify an unmodelled error response.
///
/// S3 reports a missing bucket on PUT as a 404 with a `NoSuchBucket` code in
/// the XML body.
fn classify_response(bucket: &str, status: u16, body: &[u8]) -> SinkError {
    let body = String::from_utf8_lossy(body);
    if status == 404 && body.contains("NoSuchBucket") {
        return SinkError::BucketNotFound(bucket.to_string());
    }
    SinkError::Rejected(format!("HTTP {}: {}", status, body.trim()))
}

fn classify_put_error<E: std::error::Error + 'static>(bucket: &str, error: RusotoError<E>) -> SinkError {
    match error {
        RusotoError::Unknown(response) => {
            classify_response(bucket, response.status.as_u16(), &response.body)
        }
        other => SinkError::Rejected(other.to_string()),
    }
}

#[async_trait]
impl ObjectStoreSink for S3Sink {
    fn describe(&self) -> String {
        format!("s3 ({})", self.region.name())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError> {
        let request = HeadBucketRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };

        match self.client.head_bucket(request).await {
            Ok(_) => Ok(true),
            Err(RusotoError::Service(HeadBucketError::NoSuchBucket(_))) => Ok(false),
            // HEAD responses carry no body, so a missing bucket is a bare 404
            Err(RusotoError::Unknown(response)) if response.status.as_u16() == 404 => Ok(false),
            Err(e) => {
                warn!("Failed to check bucket {}: {}", bucket, e);
                Err(SinkError::Rejected(format!("head bucket {} failed: {}", bucket, e)))
            }
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> Result<(), SinkError> {
        let content_length = body.content_length();

        let byte_stream = match body {
            ObjectBody::Stream { stream, content_length: Some(size) } => {
                ByteStream::new_with_size(stream, size as usize)
            }
            ObjectBody::Stream { stream, content_length: None } => ByteStream::new(stream),
            ObjectBody::File { path, content_length } => {
                let file = tokio::fs::File::open(&path).await?;
                let stream = FramedRead::new(file, BytesCodec::new()).map_ok(BytesMut::freeze);
                ByteStream::new_with_size(stream, content_length as usize)
            }
        };

        let request = PutObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body: Some(byte_stream),
            content_length: content_length.map(|n| n as i64),
            ..Default::default()
        };

        debug!("Putting s3://{}/{} ({:?} bytes)", bucket, key, content_length);

        match self.client.put_object(request).await {
            Ok(output) => {
                info!(
                    "Uploaded s3://{}/{} (etag {})",
                    bucket,
                    key,
                    output.e_tag.as_deref().unwrap_or("unknown")
                );
                Ok(())
            }
            Err(e) => Err(classify_put_error(bucket, e)),
        }
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), SinkError> {
        let request = DeleteObjectRequest {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Default::default()
        };

        self.client
            .delete_object(request)
            .await
            .map(|_| ())
            .map_err(|e| SinkError::Rejected(format!("delete s3://{}/{} failed: {}", bucket, key, e)))
    }
}
