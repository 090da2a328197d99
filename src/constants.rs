//! Global constants for the sftp-to-s3 transfer task.
//!
//! This module centralizes hardcoded values so the transfer, connection and
//! CLI layers agree on defaults.

// Connection identifiers
/// Connection id used for the SFTP side when none is given
pub const DEFAULT_SFTP_CONN_ID: &str = "ssh_default";

/// Connection id used for the S3 side when none is given
pub const DEFAULT_S3_CONN_ID: &str = "aws_default";

/// Default connections file looked up by the CLI
pub const DEFAULT_CONNECTIONS_FILE: &str = "connections.yaml";

// Transfer defaults
/// Stage through a local temporary file unless told otherwise
pub const DEFAULT_USE_TEMP_FILE: bool = true;

/// Fail when the remote file is missing unless told otherwise
pub const DEFAULT_FAIL_ON_FILE_NOT_EXIST: bool = true;

/// Chunk size used when streaming a remote file into an upload (64KB)
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Number of chunks buffered between the SFTP reader and the upload
pub const STREAM_CHANNEL_DEPTH: usize = 16;

/// Buffer size for copying into the staging file (1MB)
pub const STAGING_BUFFER_SIZE: usize = 1024 * 1024;

/// Prefix for staging file names
pub const STAGING_FILE_PREFIX: &str = "sftp-to-s3-";

// SFTP constants
/// Default SFTP port
pub const SFTP_DEFAULT_PORT: u16 = 22;

/// Default connection timeout in seconds
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// libssh2 status code for a missing remote path (LIBSSH2_FX_NO_SUCH_FILE)
pub const SFTP_NO_SUCH_FILE: i32 = 2;

// Error messages
pub const ERROR_FAILED_TO_CREATE_SESSION: &str = "Failed to create SSH session";
pub const ERROR_FAILED_TO_CREATE_SFTP: &str = "Failed to create SFTP subsystem";
pub const ERROR_AUTHENTICATION_FAILED: &str = "Authentication failed";
