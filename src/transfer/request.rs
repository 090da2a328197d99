use std::path::{Path, PathBuf};

use log::warn;

use crate::constants::{
    DEFAULT_FAIL_ON_FILE_NOT_EXIST, DEFAULT_S3_CONN_ID, DEFAULT_SFTP_CONN_ID, DEFAULT_USE_TEMP_FILE,
};
use crate::transfer::error::TransferError;

/// Everything needed to copy one remote file into one object.
///
/// Built through [`TransferRequest::builder`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    sftp_conn_id: String,
    s3_conn_id: String,
    sftp_path: String,
    s3_bucket: String,
    s3_key: String,
    use_temp_file: bool,
    fail_on_file_not_exist: bool,
    staging_dir: Option<PathBuf>,
}

impl TransferRequest {
    pub fn builder() -> TransferRequestBuilder {
        TransferRequestBuilder::default()
    }

    pub fn sftp_conn_id(&self) -> &str {
        &self.sftp_conn_id
    }

    pub fn s3_conn_id(&self) -> &str {
        &self.s3_conn_id
    }

    pub fn sftp_path(&self) -> &str {
        &self.sftp_path
    }

    pub fn s3_bucket(&self) -> &str {
        &self.s3_bucket
    }

    /// Destination key, already normalized
    pub fn s3_key(&self) -> &str {
        &self.s3_key
    }

    pub fn use_temp_file(&self) -> bool {
        self.use_temp_file
    }

    pub fn fail_on_file_not_exist(&self) -> bool {
        self.fail_on_file_not_exist
    }

    /// Directory for staging files; the system temp dir when unset
    pub fn staging_dir(&self) -> Option<&Path> {
        self.staging_dir.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransferRequestBuilder {
    sftp_conn_id: Option<String>,
    s3_conn_id: Option<String>,
    sftp_path: Option<String>,
    s3_bucket: Option<String>,
    s3_key: Option<String>,
    use_temp_file: Option<bool>,
    fail_on_file_not_exist: Option<bool>,
    staging_dir: Option<PathBuf>,
}

impl TransferRequestBuilder {
    pub fn sftp_conn_id(mut self, conn_id: impl Into<String>) -> Self {
        self.sftp_conn_id = Some(conn_id.into());
        self
    }

    pub fn s3_conn_id(mut self, conn_id: impl Into<String>) -> Self {
        self.s3_conn_id = Some(conn_id.into());
        self
    }

    pub fn sftp_path(mut self, path: impl Into<String>) -> Self {
        self.sftp_path = Some(path.into());
        self
    }

    pub fn s3_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.s3_bucket = Some(bucket.into());
        self
    }

    /// Plain key (`test/test_1_file.csv`) or URL (`s3://bucket/test/test_1_file.csv`)
    pub fn s3_key(mut self, key: impl Into<String>) -> Self {
        self.s3_key = Some(key.into());
        self
    }

    pub fn use_temp_file(mut self, use_temp_file: bool) -> Self {
        self.use_temp_file = Some(use_temp_file);
        self
    }

    pub fn fail_on_file_not_exist(mut self, fail: bool) -> Self {
        self.fail_on_file_not_exist = Some(fail);
        self
    }

    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn build(self) -> Result<TransferRequest, TransferError> {
        let sftp_path = required(self.sftp_path, "sftp_path")?.trim().to_string();
        let s3_bucket = required(self.s3_bucket, "s3_bucket")?.trim().to_string();
        // Keys keep surrounding whitespace; S3 treats it as part of the name
        let raw_key = required(self.s3_key, "s3_key")?;
        let s3_key = normalize_s3_key(&raw_key)?;

        if let Some(url_bucket) = url_bucket(&raw_key) {
            if url_bucket != s3_bucket {
                warn!(
                    "s3_key {} names bucket {}, writing to {} instead",
                    raw_key, url_bucket, s3_bucket
                );
            }
        }

        Ok(TransferRequest {
            sftp_conn_id: self.sftp_conn_id.unwrap_or_else(|| DEFAULT_SFTP_CONN_ID.to_string()),
            s3_conn_id: self.s3_conn_id.unwrap_or_else(|| DEFAULT_S3_CONN_ID.to_string()),
            sftp_path,
            s3_bucket,
            s3_key,
            use_temp_file: self.use_temp_file.unwrap_or(DEFAULT_USE_TEMP_FILE),
            fail_on_file_not_exist: self
                .fail_on_file_not_exist
                .unwrap_or(DEFAULT_FAIL_ON_FILE_NOT_EXIST),
            staging_dir: self.staging_dir,
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, TransferError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TransferError::InvalidRequest(format!("{} must not be empty", name))),
    }
}

const S3_URL_SCHEME: &str = "s3://";

fn strip_s3_scheme(raw: &str) -> Option<&str> {
    let prefix = raw.get(..S3_URL_SCHEME.len())?;
    if prefix.eq_ignore_ascii_case(S3_URL_SCHEME) {
        Some(&raw[S3_URL_SCHEME.len()..])
    } else {
        None
    }
}

fn url_bucket(raw: &str) -> Option<&str> {
    let rest = strip_s3_scheme(raw)?;
    rest.split('/').next().filter(|b| !b.is_empty())
}

/// Reduce a key given as plain text or as an `s3://` URL to the object key.
///
/// URL keys lose their scheme, bucket, query and fragment. Leading slashes are
/// stripped in both forms; anything else is kept byte for byte.
pub fn normalize_s3_key(raw: &str) -> Result<String, TransferError> {
    let path = match strip_s3_scheme(raw) {
        Some(rest) => {
            let rest = rest.split(|c| c == '?' || c == '#').next().unwrap_or_default();
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "",
            }
        }
        None => raw,
    };

    let key = path.trim_start_matches('/');
    if key.is_empty() {
        return Err(TransferError::InvalidRequest(format!(
            "s3_key {:?} does not name an object",
            raw
        )));
    }

    Ok(key.to_string())
}
