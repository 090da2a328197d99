use std::io;

use crate::cloud::resolver::ResolveError;
use crate::cloud::sink::SinkError;
use crate::cloud::source::SourceError;

/// Why a transfer did not complete.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The remote file is missing and the request does not tolerate that
    #[error("remote file {0} does not exist")]
    SourceNotFound(String),

    /// Opening or reading the remote file failed
    #[error("reading remote file {path} failed: {source}")]
    SourceRead {
        path: String,
        #[source]
        source: SourceError,
    },

    /// The object store refused or failed the write
    #[error("writing s3://{bucket}/{key} failed: {source}")]
    SinkWrite {
        bucket: String,
        key: String,
        #[source]
        source: SinkError,
    },

    /// A connection id could not be turned into a client
    #[error(transparent)]
    Connection(#[from] ResolveError),

    /// The local staging file could not be created or written
    #[error("staging {path} locally failed: {source}")]
    Staging {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The request itself is unusable (empty bucket, key or path)
    #[error("invalid transfer request: {0}")]
    InvalidRequest(String),
}

impl TransferError {
    /// Whether this is a write to a bucket that does not exist
    pub fn is_bucket_not_found(&self) -> bool {
        matches!(
            self,
            TransferError::SinkWrite { source: SinkError::BucketNotFound(_), .. }
        )
    }

    pub(crate) fn source_read(path: &str, source: SourceError) -> Self {
        match source {
            SourceError::NotFound(_) => TransferError::SourceNotFound(path.to_string()),
            other => TransferError::SourceRead { path: path.to_string(), source: other },
        }
    }

    pub(crate) fn sink_write(bucket: &str, key: &str, source: SinkError) -> Self {
        TransferError::SinkWrite {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn staging(path: &str, source: io::Error) -> Self {
        TransferError::Staging { path: path.to_string(), source }
    }
}
