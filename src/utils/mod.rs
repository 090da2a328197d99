//! Small helpers shared by the transfer paths.
//!
//! ```no_run
//! use sftp_to_s3::utils::hash::sha256_file;
//! use std::path::Path;
//!
//! # fn example() -> std::io::Result<()> {
//! let digest = sha256_file(Path::new("/tmp/staged.csv"))?;
//! println!("SHA-256: {}", digest);
//! # Ok(())
//! # }
//! ```

/// Cryptographic hash calculation utilities
pub mod hash;
