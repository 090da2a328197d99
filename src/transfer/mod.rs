//! The SFTP to S3 transfer task.
//!
//! ```no_run
//! use sftp_to_s3::cloud::resolver::ConfigConnectionResolver;
//! use sftp_to_s3::config::load_connections;
//! use sftp_to_s3::transfer::{run_transfer, TransferRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let resolver = ConfigConnectionResolver::new(load_connections(None)?);
//! let request = TransferRequest::builder()
//!     .sftp_path("/upload/test_1_file.csv")
//!     .s3_bucket("test-bucket")
//!     .s3_key("test/test_1_file.csv")
//!     .build()?;
//!
//! let outcome = run_transfer(request, &resolver).await?;
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod request;
pub mod staging;
pub mod task;

pub use error::TransferError;
pub use request::{normalize_s3_key, TransferRequest, TransferRequestBuilder};
pub use task::{run_transfer, TransferTask};
