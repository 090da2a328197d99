use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::{DEFAULT_CONNECTIONS_FILE, DEFAULT_S3_CONN_ID, DEFAULT_SFTP_CONN_ID};
use crate::transfer::TransferRequest;

/// Command-line arguments for the sftp-to-s3 tool.
///
/// One invocation copies one remote file into one object. Connection ids are
/// looked up in the connections file.
#[derive(Parser, Debug)]
#[clap(name = "sftp-to-s3", about = "Copy a file from an SFTP server into an S3 bucket")]
pub struct Args {
    /// Remote path of the file on the SFTP server
    #[clap(long)]
    pub sftp_path: Option<String>,

    /// Destination S3 bucket
    #[clap(long)]
    pub s3_bucket: Option<String>,

    /// Destination key, plain or as s3://bucket/key
    #[clap(long)]
    pub s3_key: Option<String>,

    /// Connection id of the SFTP server
    #[clap(long, default_value = DEFAULT_SFTP_CONN_ID)]
    pub sftp_conn_id: String,

    /// Connection id of the S3 store
    #[clap(long, default_value = DEFAULT_S3_CONN_ID)]
    pub s3_conn_id: String,

    /// Path to the connections YAML file
    #[clap(short = 'c', long, default_value = DEFAULT_CONNECTIONS_FILE)]
    pub connections: PathBuf,

    /// Stream straight into the upload instead of staging a local copy
    #[clap(long)]
    pub no_temp_file: bool,

    /// Directory for the local staging copy (default: system temp dir)
    #[clap(long)]
    pub staging_dir: Option<PathBuf>,

    /// Succeed without uploading when the remote file does not exist
    #[clap(long)]
    pub allow_missing: bool,

    /// Write a JSON report of the outcome to this path
    #[clap(long)]
    pub report: Option<PathBuf>,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Args {
    /// Turn the transfer flags into a request
    pub fn transfer_request(&self) -> Result<TransferRequest> {
        let sftp_path = self.sftp_path.as_ref().ok_or_else(|| anyhow!("--sftp-path is required"))?;
        let s3_bucket = self.s3_bucket.as_ref().ok_or_else(|| anyhow!("--s3-bucket is required"))?;
        let s3_key = self.s3_key.as_ref().ok_or_else(|| anyhow!("--s3-key is required"))?;

        let mut builder = TransferRequest::builder()
            .sftp_conn_id(self.sftp_conn_id.as_str())
            .s3_conn_id(self.s3_conn_id.as_str())
            .sftp_path(sftp_path.as_str())
            .s3_bucket(s3_bucket.as_str())
            .s3_key(s3_key.as_str())
            .use_temp_file(!self.no_temp_file)
            .fail_on_file_not_exist(!self.allow_missing);

        if let Some(dir) = &self.staging_dir {
            builder = builder.staging_dir(dir);
        }

        Ok(builder.build()?)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a sample connections file
    InitConfig {
        /// Path to output connections file
        #[clap(default_value = DEFAULT_CONNECTIONS_FILE)]
        path: PathBuf,
    },
}
