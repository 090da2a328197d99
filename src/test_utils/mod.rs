//! Test utilities for sftp-to-s3
//!
//! Common helpers for the unit test modules.

#![cfg(test)]

use anyhow::Result;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

/// Creates a temporary directory that is automatically cleaned up
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a temporary file with the given content
pub fn create_temp_file(content: &[u8]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    use std::io::Write;
    file.write_all(content)?;
    file.flush()?;
    Ok(file)
}

/// Number of entries directly inside `dir`
pub fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Deterministic, non-repeating-looking test content of `len` bytes
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 251) % 256) as u8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_temp_file() {
        let file = create_temp_file(b"hello").unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), b"hello");
    }

    #[test]
    fn test_count_entries() {
        let dir = create_temp_dir().unwrap();
        assert_eq!(count_entries(dir.path()), 0);
        std::fs::write(dir.path().join("a"), b"x").unwrap();
        assert_eq!(count_entries(dir.path()), 1);
    }

    #[test]
    fn test_patterned_bytes() {
        let bytes = patterned_bytes(1000);
        assert_eq!(bytes.len(), 1000);
        assert_ne!(bytes[0..10], bytes[256..266]);
    }
}
