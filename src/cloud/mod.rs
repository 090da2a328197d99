//! Remote endpoints for a transfer.
//!
//! The transfer task only sees two traits: a [`source::RemoteFileSource`] that
//! files are read from and a [`sink::ObjectStoreSink`] that objects are put
//! into. Connection ids are turned into concrete clients by a
//! [`resolver::ConnectionResolver`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   SFTP server   │────▶│  Transfer task  │────▶│    S3 bucket    │
//! │  (SftpSource)   │     │ direct / staged │     │    (S3Sink)     │
//! └─────────────────┘     └────────┬────────┘     └─────────────────┘
//!                                  │
//!                         ┌────────▼────────┐
//!                         │ Staging file or │
//!                         │  reader stream  │
//!                         └─────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use sftp_to_s3::cloud::s3::{S3Config, S3Sink};
//! use sftp_to_s3::cloud::sink::ObjectStoreSink;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let sink = S3Sink::from_config(&S3Config {
//!     region: Some("us-east-1".to_string()),
//!     ..Default::default()
//! })?;
//!
//! if !sink.bucket_exists("test-bucket").await? {
//!     println!("bucket is missing");
//! }
//! # Ok(())
//! # }
//! ```

/// Region and client construction for S3
pub mod client;

/// In-process source and sink
pub mod memory;

/// Connection id resolution
pub mod resolver;

/// Amazon S3 sink and configuration
pub mod s3;

/// SFTP source and configuration
pub mod sftp;

/// Object store sink trait
pub mod sink;

/// Remote file source trait
pub mod source;

/// Blocking reader to body stream adapter
pub mod streaming;
