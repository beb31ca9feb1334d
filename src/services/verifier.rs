use crate::models::VerifyReport;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Issues a body-less existence request and returns the HTTP status
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn head(&self, url: &str) -> Result<u16>;
}

/// HEAD request over reqwest
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("rust-asset-backend/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReachabilityProbe for HttpProbe {
    async fn head(&self, url: &str) -> Result<u16> {
        let response = self.client.head(url).send().await?;
        Ok(response.status().as_u16())
    }
}

/// Answers "is this URL servable right now?"
pub struct ReachabilityVerifier {
    probe: Arc<dyn ReachabilityProbe>,
}

impl ReachabilityVerifier {
    pub fn new(probe: Arc<dyn ReachabilityProbe>) -> Self {
        Self { probe }
    }

    /// One check. Network errors count as unreachable with no status.
    pub async fn verify(&self, public_url: &str) -> VerifyReport {
        match self.probe.head(public_url).await {
            Ok(status) => {
                let reachable = (200..300).contains(&status);
                tracing::debug!("HEAD {} -> {}", public_url, status);
                VerifyReport {
                    reachable,
                    http_status: Some(status),
                }
            }
            Err(e) => {
                tracing::warn!("Existence check for {} failed: {}", public_url, e);
                VerifyReport::unreachable(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe(Result<u16, &'static str>);

    #[async_trait]
    impl ReachabilityProbe for FixedProbe {
        async fn head(&self, _url: &str) -> Result<u16> {
            self.0.map_err(|e| anyhow::anyhow!(e))
        }
    }

    async fn verify_with(result: Result<u16, &'static str>) -> VerifyReport {
        ReachabilityVerifier::new(Arc::new(FixedProbe(result)))
            .verify("https://static.example.com/Images/a.png")
            .await
    }

    #[tokio::test]
    async fn test_success_statuses_are_reachable() {
        assert!(verify_with(Ok(200)).await.reachable);
        assert!(verify_with(Ok(204)).await.reachable);
    }

    #[tokio::test]
    async fn test_other_statuses_are_not() {
        let report = verify_with(Ok(403)).await;
        assert!(!report.reachable);
        assert_eq!(report.http_status, Some(403));

        assert!(!verify_with(Ok(301)).await.reachable);
        assert!(!verify_with(Ok(404)).await.reachable);
    }

    #[tokio::test]
    async fn test_probe_error_has_no_status() {
        let report = verify_with(Err("connection refused")).await;
        assert_eq!(report, VerifyReport::unreachable(None));
    }
}
