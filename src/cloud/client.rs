use anyhow::{Context, Result};
use log::{debug, warn};
use rusoto_core::{HttpClient, Region};
use rusoto_credential::{ProfileProvider, StaticProvider};
use rusoto_s3::S3Client;

use crate::cloud::s3::S3Config;

/// Resolve the region for a connection.
///
/// A custom endpoint (MinIO, Ceph, localstack) always wins and keeps the
/// configured region name for request signing. Unknown region names fall back
/// to the default region.
pub fn resolve_region(config: &S3Config) -> Region {
    if let Some(endpoint) = &config.endpoint {
        return Region::Custom {
            name: config.region.clone().unwrap_or_else(|| "us-east-1".to_string()),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        };
    }

    match &config.region {
        Some(name) => match name.parse::<Region>() {
            Ok(r) => r,
            Err(_) => {
                warn!("Invalid region '{}', using default", name);
                Region::default()
            }
        },
        None => Region::default(),
    }
}

/// Create an S3 client for a connection.
///
/// Credentials come from, in order: static keys in the connection, the named
/// profile, then the default provider chain.
pub fn create_s3_client(config: &S3Config) -> Result<S3Client> {
    let region = resolve_region(config);

    if let (Some(key), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
        debug!("Using static credentials for region {}", region.name());
        let provider = StaticProvider::new_minimal(key.clone(), secret.clone());
        let http_client = HttpClient::new().context("Failed to create HTTP client")?;
        return Ok(S3Client::new_with(http_client, provider, region));
    }

    // Create S3 client with profile if specified
    if let Some(profile_name) = &config.profile {
        match ProfileProvider::new() {
            Ok(mut provider) => {
                provider.set_profile(profile_name.as_str());
                let http_client = HttpClient::new().context("Failed to create HTTP client")?;
                return Ok(S3Client::new_with(http_client, provider, region));
            }
            Err(e) => {
                warn!("Failed to create AWS profile provider: {}, using default", e);
            }
        }
    }

    Ok(S3Client::new(region))
}
