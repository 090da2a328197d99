use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::cloud::s3::S3Config;
use crate::cloud::sftp::SFTPConfig;
use crate::config::env_vars::{expand_env_vars, expand_optional, expand_optional_path};
use crate::constants::{DEFAULT_CONNECTIONS_FILE, DEFAULT_S3_CONN_ID, DEFAULT_SFTP_CONN_ID};

/// One named connection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Sftp(SFTPConfig),
    S3(S3Config),
}

impl ConnectionConfig {
    /// Short name of the connection type
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectionConfig::Sftp(_) => "sftp",
            ConnectionConfig::S3(_) => "s3",
        }
    }

    fn expand_environment_variables(&mut self) {
        match self {
            ConnectionConfig::Sftp(sftp) => {
                sftp.host = expand_env_vars(&sftp.host);
                sftp.username = expand_env_vars(&sftp.username);
                expand_optional(&mut sftp.password);
                expand_optional(&mut sftp.private_key_passphrase);
                expand_optional_path(&mut sftp.private_key_path);
                expand_optional_path(&mut sftp.known_hosts_path);
            }
            ConnectionConfig::S3(s3) => {
                expand_optional(&mut s3.region);
                expand_optional(&mut s3.profile);
                expand_optional(&mut s3.endpoint);
                expand_optional(&mut s3.access_key_id);
                expand_optional(&mut s3.secret_access_key);
            }
        }
    }
}

/// The connections file: connection id → connection settings.
///
/// ```yaml
/// connections:
///   ssh_default:
///     type: sftp
///     host: sftp.example.com
///     username: transfer
///     password: ${SFTP_PASSWORD}
///   aws_default:
///     type: s3
///     region: us-east-1
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConnectionsConfig {
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

impl ConnectionsConfig {
    /// Parse a connections document and expand environment variables
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let mut config: ConnectionsConfig = serde_yaml::from_str(content)
            .context("Failed to parse connections YAML")?;
        config.expand_environment_variables();
        Ok(config)
    }

    /// Load connections from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read connections file: {}", path.display()))?;

        let config = Self::from_yaml_str(&content)
            .context(format!("Invalid connections file: {}", path.display()))?;

        debug!("Loaded {} connections from {}", config.connections.len(), path.display());
        Ok(config)
    }

    /// Save connections to a YAML file
    pub fn save_to_yaml_file(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize connections to YAML")?;

        fs::write(path, yaml)
            .context(format!("Failed to write connections to {}", path.display()))?;

        info!("Saved connections to {}", path.display());
        Ok(())
    }

    /// Substitute `$VAR` / `${VAR}` in every string setting
    pub fn expand_environment_variables(&mut self) {
        for connection in self.connections.values_mut() {
            connection.expand_environment_variables();
        }
    }

    /// A starting point with the two default connection ids
    pub fn sample() -> Self {
        let mut connections = BTreeMap::new();

        connections.insert(
            DEFAULT_SFTP_CONN_ID.to_string(),
            ConnectionConfig::Sftp(SFTPConfig {
                host: "sftp.example.com".to_string(),
                username: "transfer".to_string(),
                private_key_path: Some(PathBuf::from("${HOME}/.ssh/id_rsa")),
                ..Default::default()
            }),
        );

        connections.insert(
            DEFAULT_S3_CONN_ID.to_string(),
            ConnectionConfig::S3(S3Config {
                region: Some("us-east-1".to_string()),
                ..Default::default()
            }),
        );

        Self { connections }
    }

    /// Write the sample connections file to `path`
    pub fn create_sample_config_file(path: &Path) -> Result<()> {
        Self::sample().save_to_yaml_file(path)
    }
}

/// Load connections from `path`, or from `connections.yaml` in the working
/// directory when no path is given.
pub fn load_connections(path: Option<&Path>) -> Result<ConnectionsConfig> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONNECTIONS_FILE));

    if !path.exists() {
        return Err(anyhow!(
            "Connections file {} not found (create one with `sftp-to-s3 init-config`)",
            path.display()
        ));
    }

    ConnectionsConfig::from_yaml_file(&path)
}
