use std::io::{self, Read, Write};
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use crate::cloud::source::{RemoteFile, SourceError};
use crate::constants::{STAGING_BUFFER_SIZE, STAGING_FILE_PREFIX};
use crate::transfer::error::TransferError;

/// A complete local copy of a remote file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct StagedFile {
    file: NamedTempFile,
    len: u64,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

fn create_staging_file(dir: Option<&Path>) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(STAGING_FILE_PREFIX);
    match dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
}

/// Copy `remote` into a new staging file and flush it to disk.
///
/// Blocking. Read failures are reported against `sftp_path`; local write
/// failures as [`TransferError::Staging`]. On any error the partial staging
/// file is removed before returning.
pub fn stage_remote_file(
    remote: RemoteFile,
    sftp_path: &str,
    staging_dir: Option<&Path>,
) -> Result<StagedFile, TransferError> {
    let staging_label = staging_dir
        .map(|d| d.display().to_string())
        .unwrap_or_else(|| std::env::temp_dir().display().to_string());

    let mut file = create_staging_file(staging_dir)
        .map_err(|e| TransferError::staging(&staging_label, e))?;
    let local_path = file.path().display().to_string();

    debug!("Staging {} into {}", sftp_path, local_path);

    let expected = remote.size;
    let mut reader = remote.reader;
    let mut buffer = vec![0u8; STAGING_BUFFER_SIZE];
    let mut copied: u64 = 0;

    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(TransferError::source_read(sftp_path, SourceError::Io(e))),
        };

        file.write_all(&buffer[..n])
            .map_err(|e| TransferError::staging(&local_path, e))?;
        copied += n as u64;
    }

    file.flush().map_err(|e| TransferError::staging(&local_path, e))?;
    file.as_file().sync_all().map_err(|e| TransferError::staging(&local_path, e))?;

    if let Some(expected) = expected {
        if copied != expected {
            return Err(TransferError::source_read(
                sftp_path,
                SourceError::SizeMismatch { expected, actual: copied },
            ));
        }
    }

    debug!("Staged {} bytes of {} in {}", copied, sftp_path, local_path);

    Ok(StagedFile { file, len: copied })
}
