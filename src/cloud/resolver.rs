//! Connection resolution.
//!
//! A transfer names its two endpoints by connection id (`ssh_default`,
//! `aws_default`, ...). A [`ConnectionResolver`] turns those ids into live
//! clients, keeping credential storage out of the transfer itself.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::cloud::s3::S3Sink;
use crate::cloud::sftp::SftpSource;
use crate::cloud::sink::ObjectStoreSink;
use crate::cloud::source::RemoteFileSource;
use crate::config::{ConnectionConfig, ConnectionsConfig};
use crate::security::scrub_credentials;

/// Why a connection id could not be turned into a client.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("connection '{0}' is not defined")]
    Unknown(String),

    #[error("connection '{conn_id}' is a {actual} connection, expected {expected}")]
    WrongKind {
        conn_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("connection '{conn_id}' failed: {reason}")]
    Connect { conn_id: String, reason: String },
}

/// Maps opaque connection ids to live clients.
pub trait ConnectionResolver: Send + Sync {
    fn remote_source(&self, conn_id: &str) -> Result<Arc<dyn RemoteFileSource>, ResolveError>;

    fn object_sink(&self, conn_id: &str) -> Result<Arc<dyn ObjectStoreSink>, ResolveError>;
}

/// Resolver over connections loaded from a YAML file.
///
/// Each call opens a fresh client, so every transfer owns its own session.
#[derive(Debug, Clone)]
pub struct ConfigConnectionResolver {
    config: ConnectionsConfig,
}

impl ConfigConnectionResolver {
    pub fn new(config: ConnectionsConfig) -> Self {
        Self { config }
    }

    fn lookup(&self, conn_id: &str) -> Result<&ConnectionConfig, ResolveError> {
        self.config
            .connections
            .get(conn_id)
            .ok_or_else(|| ResolveError::Unknown(conn_id.to_string()))
    }
}

impl ConnectionResolver for ConfigConnectionResolver {
    fn remote_source(&self, conn_id: &str) -> Result<Arc<dyn RemoteFileSource>, ResolveError> {
        match self.lookup(conn_id)? {
            ConnectionConfig::Sftp(sftp) => {
                debug!("Resolving '{}' to {}", conn_id, sftp.display_url());
                let source = SftpSource::connect(sftp.clone()).map_err(|e| ResolveError::Connect {
                    conn_id: conn_id.to_string(),
                    reason: scrub_credentials(&format!("{:#}", e)),
                })?;
                Ok(Arc::new(source))
            }
            other => Err(ResolveError::WrongKind {
                conn_id: conn_id.to_string(),
                expected: "sftp",
                actual: other.kind(),
            }),
        }
    }

    fn object_sink(&self, conn_id: &str) -> Result<Arc<dyn ObjectStoreSink>, ResolveError> {
        match self.lookup(conn_id)? {
            ConnectionConfig::S3(s3) => {
                debug!("Resolving '{}' to {:?}", conn_id, s3);
                let sink = S3Sink::from_config(s3).map_err(|e| ResolveError::Connect {
                    conn_id: conn_id.to_string(),
                    reason: scrub_credentials(&format!("{:#}", e)),
                })?;
                Ok(Arc::new(sink))
            }
            other => Err(ResolveError::WrongKind {
                conn_id: conn_id.to_string(),
                expected: "s3",
                actual: other.kind(),
            }),
        }
    }
}

/// Resolver over clients built up front, keyed by connection id.
#[derive(Default, Clone)]
pub struct StaticResolver {
    sources: HashMap<String, Arc<dyn RemoteFileSource>>,
    sinks: HashMap<String, Arc<dyn ObjectStoreSink>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, conn_id: &str, source: Arc<dyn RemoteFileSource>) -> Self {
        self.sources.insert(conn_id.to_string(), source);
        self
    }

    pub fn with_sink(mut self, conn_id: &str, sink: Arc<dyn ObjectStoreSink>) -> Self {
        self.sinks.insert(conn_id.to_string(), sink);
        self
    }
}

impl ConnectionResolver for StaticResolver {
    fn remote_source(&self, conn_id: &str) -> Result<Arc<dyn RemoteFileSource>, ResolveError> {
        self.sources
            .get(conn_id)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(conn_id.to_string()))
    }

    fn object_sink(&self, conn_id: &str) -> Result<Arc<dyn ObjectStoreSink>, ResolveError> {
        self.sinks
            .get(conn_id)
            .cloned()
            .ok_or_else(|| ResolveError::Unknown(conn_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::memory::{MemorySink, MemorySource};
    use crate::cloud::s3::S3Config;
    use crate::cloud::sftp::SFTPConfig;

    fn config_with(entries: Vec<(&str, ConnectionConfig)>) -> ConnectionsConfig {
        ConnectionsConfig {
            connections: entries
                .into_iter()
                .map(|(id, conn)| (id.to_string(), conn))
                .collect(),
        }
    }

    #[test]
    fn test_static_resolver_lookup() {
        let resolver = StaticResolver::new()
            .with_source("ssh_default", Arc::new(MemorySource::new()))
            .with_sink("aws_default", Arc::new(MemorySink::new()));

        assert_eq!(resolver.remote_source("ssh_default").unwrap().describe(), "memory://source");
        assert_eq!(resolver.object_sink("aws_default").unwrap().describe(), "memory://sink");
        assert!(matches!(
            resolver.remote_source("aws_default"),
            Err(ResolveError::Unknown(id)) if id == "aws_default"
        ));
    }

    #[test]
    fn test_config_resolver_unknown_id() {
        let resolver = ConfigConnectionResolver::new(config_with(vec![]));
        assert!(matches!(
            resolver.object_sink("aws_default"),
            Err(ResolveError::Unknown(_))
        ));
    }

    #[test]
    fn test_config_resolver_wrong_kind() {
        let resolver = ConfigConnectionResolver::new(config_with(vec![
            ("aws_default", ConnectionConfig::S3(S3Config::default())),
            ("ssh_default", ConnectionConfig::Sftp(SFTPConfig::default())),
        ]));

        match resolver.remote_source("aws_default") {
            Err(ResolveError::WrongKind { expected, actual, .. }) => {
                assert_eq!(expected, "sftp");
                assert_eq!(actual, "s3");
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }

        assert!(matches!(
            resolver.object_sink("ssh_default"),
            Err(ResolveError::WrongKind { expected: "s3", .. })
        ));
    }

    #[test]
    fn test_config_resolver_builds_s3_sink() {
        let resolver = ConfigConnectionResolver::new(config_with(vec![(
            "aws_default",
            ConnectionConfig::S3(S3Config {
                region: Some("us-west-2".to_string()),
                ..Default::default()
            }),
        )]));

        let sink = resolver.object_sink("aws_default").unwrap();
        assert_eq!(sink.describe(), "s3 (us-west-2)");
    }

    #[test]
    fn test_config_resolver_connect_failure_scrubbed() {
        let resolver = ConfigConnectionResolver::new(config_with(vec![(
            "ssh_default",
            ConnectionConfig::Sftp(SFTPConfig {
                host: "127.0.0.1".to_string(),
                port: 1,
                username: "transfer".to_string(),
                password: Some("hunter2".to_string()),
                connection_timeout_sec: 2,
                ..Default::default()
            }),
        )]));

        match resolver.remote_source("ssh_default") {
            Err(ResolveError::Connect { conn_id, reason }) => {
                assert_eq!(conn_id, "ssh_default");
                assert!(!reason.contains("hunter2"));
            }
            other => panic!("unexpected result: {:?}", other.err()),
        }
    }
}
