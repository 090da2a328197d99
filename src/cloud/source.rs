use std::fmt;
use std::io::{self, Read};

/// Errors raised by a remote file source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The remote path does not exist.
    #[error("no such file: {0}")]
    NotFound(String),

    /// The underlying session or protocol failed.
    #[error("{0}")]
    Protocol(String),

    /// Reading the remote file failed part way through.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// The remote file ended before (or after) the size announced by the server.
    #[error("expected {expected} bytes but read {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
}

/// An open read channel on a remote file.
///
/// The handle is owned by a single transfer and closed when dropped.
pub struct RemoteFile {
    /// Blocking reader over the remote content
    pub reader: Box<dyn Read + Send>,
    /// Size reported by the server, when it reports one
    pub size: Option<u64>,
}

impl RemoteFile {
    pub fn new(reader: Box<dyn Read + Send>, size: Option<u64>) -> Self {
        Self { reader, size }
    }
}

impl fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteFile").field("size", &self.size).finish_non_exhaustive()
    }
}

/// A remote file system that files can be checked and read from.
///
/// Calls are blocking; async callers should run reads on a blocking worker.
pub trait RemoteFileSource: Send + Sync {
    /// Human readable name of the source, for logs
    fn describe(&self) -> String;

    /// Whether `path` exists on the remote side
    fn exists(&self, path: &str) -> Result<bool, SourceError>;

    /// Open `path` for reading
    fn open_read(&self, path: &str) -> Result<RemoteFile, SourceError>;
}
