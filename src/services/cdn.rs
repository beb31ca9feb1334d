use crate::config::CdnConfig;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

/// Result of one deletion request against the storage backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStatus {
    Deleted,
    NotFound,
}

/// Backend that owns the assets cleanup retires
#[async_trait]
pub trait AssetDeleter: Send + Sync {
    async fn delete(&self, identifier: &str) -> Result<DeletionStatus>;
}

/// Maps a delivery URL back to the backend's asset identifier.
///
/// Delivery paths look like `/<anything>/v<digits>/<folder>/<id>.<ext>`;
/// the identifier is everything after the version segment, without the
/// extension (`folder/id`).
#[derive(Debug, Clone, Default)]
pub struct IdentifierResolver {
    host: Option<String>,
}

impl IdentifierResolver {
    pub fn new(host: Option<String>) -> Self {
        Self {
            host: host.map(|h| h.to_lowercase()),
        }
    }

    pub fn resolve(&self, public_url: &str) -> Option<String> {
        let url = Url::parse(public_url).ok()?;
        if !matches!(url.scheme(), "http" | "https") {
            return None;
        }
        if let Some(expected) = &self.host {
            if url.host_str()? != expected.as_str() {
                return None;
            }
        }

        let segments: Vec<String> = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect();

        let version_at = segments.iter().position(|s| is_version_segment(s))?;
        let rest = &segments[version_at + 1..];
        let (last, folders) = rest.split_last()?;

        let stem = match last.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => last.as_str(),
        };

        let mut identifier = folders.join("/");
        if !identifier.is_empty() {
            identifier.push('/');
        }
        identifier.push_str(stem);
        Some(identifier)
    }
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: Option<String>,
    error: Option<DestroyError>,
}

#[derive(Debug, Deserialize)]
struct DestroyError {
    message: String,
}

/// Signed destroy call against the CDN's admin API
pub struct CdnDeleter {
    client: reqwest::Client,
    config: CdnConfig,
}

impl CdnDeleter {
    pub fn new(config: CdnConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn with_client(config: CdnConfig, client: reqwest::Client) -> Self {
        Self { client, config }
    }

    /// Parameters sorted by name, `&`-joined, with the secret appended
    pub fn sign(&self, public_id: &str, timestamp: i64) -> String {
        let payload = format!(
            "public_id={}&timestamp={}{}",
            public_id, timestamp, self.config.api_secret
        );
        hex::encode(Sha256::digest(payload.as_bytes()))
    }

    fn destroy_url(&self) -> String {
        format!(
            "{}/{}/image/destroy",
            self.config.api_base, self.config.cloud_name
        )
    }
}

#[async_trait]
impl AssetDeleter for CdnDeleter {
    async fn delete(&self, identifier: &str) -> Result<DeletionStatus> {
        let timestamp = chrono::Utc::now().timestamp();
        let signature = self.sign(identifier, timestamp);
        let timestamp = timestamp.to_string();

        let response = self
            .client
            .post(self.destroy_url())
            .form(&[
                ("public_id", identifier),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.config.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Unreadable destroy response ({}): {}", status, e))?;

        if let Some(err) = body.error {
            return Err(anyhow!("Destroy rejected ({}): {}", status, err.message));
        }

        match body.result.as_deref() {
            Some("ok") => Ok(DeletionStatus::Deleted),
            Some("not found") => Ok(DeletionStatus::NotFound),
            other => Err(anyhow!("Unexpected destroy result ({}): {:?}", status, other)),
        }
    }
}
