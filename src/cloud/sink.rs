use std::fmt;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

/// A boxed stream of body chunks handed to an object store.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync + 'static>>;

/// Errors raised by an object store sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The destination bucket does not exist.
    #[error("bucket {0} does not exist")]
    BucketNotFound(String),

    /// The store rejected the request (access denied, quota, bad request).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The upload body could not be produced.
    #[error("upload body failed: {0}")]
    Body(#[from] io::Error),
}

/// Content for a single put.
pub enum ObjectBody {
    /// Bytes pulled from a live source while the upload runs
    Stream {
        stream: BodyStream,
        content_length: Option<u64>,
    },
    /// A complete local file
    File { path: PathBuf, content_length: u64 },
}

impl ObjectBody {
    /// Length of the body if known up front
    pub fn content_length(&self) -> Option<u64> {
        match self {
            ObjectBody::Stream { content_length, .. } => *content_length,
            ObjectBody::File { content_length, .. } => Some(*content_length),
        }
    }
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectBody::Stream { content_length, .. } => f
                .debug_struct("Stream")
                .field("content_length", content_length)
                .finish_non_exhaustive(),
            ObjectBody::File { path, content_length } => f
                .debug_struct("File")
                .field("path", path)
                .field("content_length", content_length)
                .finish(),
        }
    }
}

/// A bucket/key object store.
///
/// `put_object` is a single atomic put: a failed call must not leave a
/// complete object behind at `key`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStoreSink: Send + Sync {
    /// Human readable name of the sink, for logs
    fn describe(&self) -> String;

    /// Whether `bucket` exists and is reachable
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError>;

    /// Write `body` to `bucket`/`key`, replacing any existing object
    async fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> Result<(), SinkError>;

    /// Remove `bucket`/`key`; removing a missing key is not an error
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), SinkError>;
}
