use std::fmt;

use serde::{Serialize, Deserialize};

/// How the bytes travelled from the source to the sink
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Streamed straight from the SFTP read channel into the upload
    Direct,
    /// Copied into a local temporary file first
    Staged,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Direct => write!(f, "direct"),
            TransferMode::Staged => write!(f, "staged"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransferReport {
    pub sftp_path: String,
    pub bucket: String,
    pub key: String,
    pub bytes: u64,
    pub mode: TransferMode,
    /// Digest of the staged copy; not computed when streaming directly
    pub sha256: Option<String>,
    /// RFC 3339 UTC time the execution started
    pub started_at: String,
    pub elapsed_ms: u64,
}

/// Result of a successful execution
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TransferOutcome {
    Transferred(TransferReport),
    /// The remote file was missing and the request tolerates that
    Skipped { sftp_path: String },
}

impl TransferOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TransferOutcome::Skipped { .. })
    }

    pub fn report(&self) -> Option<&TransferReport> {
        match self {
            TransferOutcome::Transferred(report) => Some(report),
            TransferOutcome::Skipped { .. } => None,
        }
    }
}
