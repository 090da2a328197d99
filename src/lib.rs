//! # sftp-to-s3
//!
//! Copy a single file from an SFTP server into an S3 (or S3-compatible)
//! bucket.
//!
//! ## Overview
//!
//! A [`transfer::TransferTask`] is built from a [`transfer::TransferRequest`]
//! and a [`cloud::resolver::ConnectionResolver`]. Building the task checks that
//! the remote file exists; executing it copies the file in one of two ways:
//!
//! - **Staged** (default): the file is copied into a local temporary file,
//!   flushed, hashed and then uploaded with its exact length. The temporary
//!   file is removed on every exit path.
//! - **Direct**: the SFTP read channel is streamed straight into the upload.
//!
//! A missing remote file either fails the task (`SourceNotFound`) or, when the
//! request allows it, yields a `Skipped` outcome without touching the bucket.
//!
//! ## Usage
//!
//! ```no_run
//! use sftp_to_s3::cloud::resolver::ConfigConnectionResolver;
//! use sftp_to_s3::config::load_connections;
//! use sftp_to_s3::transfer::{TransferRequest, TransferTask};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = ConfigConnectionResolver::new(load_connections(None)?);
//!
//! let request = TransferRequest::builder()
//!     .sftp_path("/upload/test_1_file.csv")
//!     .s3_bucket("test-bucket")
//!     .s3_key("test/test_1_file.csv")
//!     .use_temp_file(false)
//!     .build()?;
//!
//! let task = TransferTask::new(request, &resolver)?;
//! let outcome = task.execute().await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`models`]: Transfer outcome and report types
//! - [`transfer`]: The transfer task, its request and errors
//! - [`cloud`]: SFTP source, S3 sink and connection resolution
//! - [`config`]: Connections file loading
//! - [`utils`]: Hashing helpers
//! - [`security`]: Credential scrubbing
//! - [`constants`]: Application-wide constants

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Transfer outcome and report types
pub mod models;

/// The SFTP to S3 transfer task
pub mod transfer;

/// Utility functions for hashing
pub mod utils;

/// Remote endpoints (SFTP source, S3 sink) and connection resolution
pub mod cloud;

/// Connections file handling
pub mod config;

/// Application constants and configuration values
pub mod constants;

/// Credential scrubbing for logs and errors
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
