use std::fmt;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use ssh2::{CheckResult, ErrorCode, KnownHostFileKind, Session, Sftp};

use crate::cloud::source::{RemoteFile, RemoteFileSource, SourceError};
use crate::constants::{
    DEFAULT_CONNECTION_TIMEOUT_SECS, ERROR_AUTHENTICATION_FAILED, ERROR_FAILED_TO_CREATE_SESSION,
    ERROR_FAILED_TO_CREATE_SFTP, SFTP_DEFAULT_PORT, SFTP_NO_SUCH_FILE,
};
use crate::security::scrub_path;

fn default_port() -> u16 {
    SFTP_DEFAULT_PORT
}

fn default_timeout() -> u64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

/// Configuration for an SFTP connection
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SFTPConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    /// Private key for public key authentication
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
    /// Passphrase protecting the private key
    #[serde(default)]
    pub private_key_passphrase: Option<String>,
    /// Password authentication, used when no private key is configured
    #[serde(default)]
    pub password: Option<String>,
    /// OpenSSH known_hosts file; when unset the host key is not checked
    #[serde(default)]
    pub known_hosts_path: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    pub connection_timeout_sec: u64,
}

impl Default for SFTPConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: SFTP_DEFAULT_PORT,
            username: String::new(),
            private_key_path: None,
            private_key_passphrase: None,
            password: None,
            known_hosts_path: None,
            connection_timeout_sec: DEFAULT_CONNECTION_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for SFTPConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SFTPConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("private_key_path", &self.private_key_path)
            .field("private_key_passphrase", &self.private_key_passphrase.as_ref().map(|_| "<REDACTED>"))
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .field("known_hosts_path", &self.known_hosts_path)
            .field("connection_timeout_sec", &self.connection_timeout_sec)
            .finish()
    }
}

impl SFTPConfig {
    /// `sftp://user@host:port` form used in log lines
    pub fn display_url(&self) -> String {
        format!("sftp://{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Remote file source over a single SSH/SFTP session.
///
/// The session is opened by [`SftpSource::connect`] and shared by every
/// check and read made through this source.
pub struct SftpSource {
    config: SFTPConfig,
    _session: Mutex<Session>,
    sftp: Mutex<Sftp>,
}

impl SftpSource {
    /// Open an SSH session, authenticate, and start the SFTP subsystem
    pub fn connect(config: SFTPConfig) -> Result<Self> {
        let session = Self::create_session(&config)?;
        let sftp = session.sftp().context(ERROR_FAILED_TO_CREATE_SFTP)?;

        info!("Connected to {}", config.display_url());

        Ok(Self {
            config,
            _session: Mutex::new(session),
            sftp: Mutex::new(sftp),
        })
    }

    /// Create a new SSH session
    fn create_session(config: &SFTPConfig) -> Result<Session> {
        if config.host.is_empty() {
            return Err(anyhow!("SFTP host is not configured"));
        }

        // Create TCP connection
        let timeout = Duration::from_secs(config.connection_timeout_sec);
        let tcp = TcpStream::connect((config.host.as_str(), config.port))
            .context(format!("Failed to connect to {}:{}", config.host, config.port))?;

        tcp.set_read_timeout(Some(timeout))
            .context("Failed to set read timeout")?;
        tcp.set_write_timeout(Some(timeout))
            .context("Failed to set write timeout")?;

        // Create SSH session
        let mut session = Session::new().context(ERROR_FAILED_TO_CREATE_SESSION)?;
        session.set_tcp_stream(tcp);
        session.set_timeout(timeout.as_millis().min(u32::MAX as u128) as u32);
        session.handshake()
            .context("Failed to perform SSH handshake")?;

        if let Some(known_hosts) = &config.known_hosts_path {
            Self::verify_host_key(&session, config, known_hosts)?;
        } else {
            debug!("No known_hosts file configured, skipping host key check for {}", config.host);
        }

        Self::authenticate(&session, config)?;

        // Verify authentication
        if !session.authenticated() {
            return Err(anyhow!(ERROR_AUTHENTICATION_FAILED));
        }

        Ok(session)
    }

    fn authenticate(session: &Session, config: &SFTPConfig) -> Result<()> {
        if let Some(key_path) = &config.private_key_path {
            session.userauth_pubkey_file(
                &config.username,
                None, // Public key is derived from the private key
                key_path,
                config.private_key_passphrase.as_deref(),
            ).context(format!(
                "Failed to authenticate with private key: {}",
                scrub_path(&key_path.to_string_lossy())
            ))?;
        } else if let Some(password) = &config.password {
            session.userauth_password(&config.username, password)
                .context(format!("Failed to authenticate {} with password", config.username))?;
        } else {
            return Err(anyhow!(
                "No credentials configured for {}: set private_key_path or password",
                config.display_url()
            ));
        }

        Ok(())
    }

    fn verify_host_key(session: &Session, config: &SFTPConfig, known_hosts_path: &Path) -> Result<()> {
        let mut known_hosts = session.known_hosts()
            .context("Failed to initialise known hosts")?;
        known_hosts.read_file(known_hosts_path, KnownHostFileKind::OpenSSH)
            .context(format!("Failed to read known hosts file {}", known_hosts_path.display()))?;

        let (key, _) = session.host_key()
            .ok_or_else(|| anyhow!("Server {} did not present a host key", config.host))?;

        match known_hosts.check_port(&config.host, config.port, key) {
            CheckResult::Match => Ok(()),
            CheckResult::NotFound => Err(anyhow!("Host key for {} not found in {}", config.host, known_hosts_path.display())),
            CheckResult::Mismatch => Err(anyhow!("Host key for {} does not match {}", config.host, known_hosts_path.display())),
            CheckResult::Failure => Err(anyhow!("Failed to check host key for {}", config.host)),
        }
    }

    fn lock_sftp(&self) -> Result<MutexGuard<'_, Sftp>, SourceError> {
        self.sftp.lock()
            .map_err(|e| SourceError::Protocol(format!("SFTP session lock poisoned: {}", e)))
    }
}

fn is_missing(error: &ssh2::Error) -> bool {
    error.code() == ErrorCode::SFTP(SFTP_NO_SUCH_FILE)
}

impl RemoteFileSource for SftpSource {
    fn describe(&self) -> String {
        self.config.display_url()
    }

    fn exists(&self, path: &str) -> Result<bool, SourceError> {
        let sftp = self.lock_sftp()?;

        match sftp.stat(Path::new(path)) {
            Ok(_) => Ok(true),
            Err(e) if is_missing(&e) => Ok(false),
            Err(e) => {
                warn!("Failed to stat {}{}: {}", self.config.display_url(), path, e);
                Err(SourceError::Protocol(format!("stat {} failed: {}", path, e)))
            }
        }
    }

    fn open_read(&self, path: &str) -> Result<RemoteFile, SourceError> {
        let sftp = self.lock_sftp()?;

        let stat = sftp.stat(Path::new(path)).map_err(|e| {
            if is_missing(&e) {
                SourceError::NotFound(path.to_string())
            } else {
                SourceError::Protocol(format!("stat {} failed: {}", path, e))
            }
        })?;

        if stat.is_dir() {
            return Err(SourceError::Protocol(format!("{} is a directory", path)));
        }

        let file = sftp.open(Path::new(path)).map_err(|e| {
            if is_missing(&e) {
                SourceError::NotFound(path.to_string())
            } else {
                SourceError::Protocol(format!("open {} failed: {}", path, e))
            }
        })?;

        debug!("Opened {}{} ({:?} bytes)", self.config.display_url(), path, stat.size);

        Ok(RemoteFile::new(Box::new(file), stat.size))
    }
}
