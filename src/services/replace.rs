use crate::error::TransferError;
use crate::models::UploadOutcome;
use crate::services::cleanup::{CleanupCoordinator, CleanupOutcome, CleanupRequest};
use crate::services::notifications::{AssetEvent, Notifier};
use crate::services::orchestrator::UploadOrchestrator;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::task::JoinHandle;

/// Persists a new public URL against the owning record
#[async_trait]
pub trait RecordUpdater: Send + Sync {
    async fn persist(&self, public_url: &str) -> anyhow::Result<()>;
}

#[derive(Error, Debug)]
pub enum ReplaceError {
    #[error("Upload failed: {0}")]
    Upload(#[from] TransferError),

    /// The asset was uploaded but the record still points at the old one
    #[error("Record update failed for {public_url}: {source}")]
    Record {
        public_url: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug)]
pub struct ReplaceOutcome {
    pub upload: UploadOutcome,
    /// Background retirement of the previous asset, if there was one
    pub cleanup: Option<JoinHandle<CleanupOutcome>>,
}

/// Upload a replacement, point the record at it, retire the old asset.
pub struct ReplaceFlow {
    orchestrator: Arc<UploadOrchestrator>,
    records: Arc<dyn RecordUpdater>,
    cleanup: Option<Arc<CleanupCoordinator>>,
    notifier: Arc<dyn Notifier>,
}

impl ReplaceFlow {
    pub fn new(
        orchestrator: Arc<UploadOrchestrator>,
        records: Arc<dyn RecordUpdater>,
        cleanup: Option<Arc<CleanupCoordinator>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            orchestrator,
            records,
            cleanup,
            notifier,
        }
    }

    pub async fn replace(
        &self,
        source: &mut (dyn AsyncRead + Unpin + Send),
        target_name: &str,
        directory_path: &str,
        previous_url: Option<&str>,
    ) -> Result<ReplaceOutcome, ReplaceError> {
        let upload = self
            .orchestrator
            .upload_and_confirm(source, target_name, directory_path)
            .await?;

        let request = Arc::new(CleanupRequest::for_replacement(
            previous_url,
            &upload.public_url,
        ));

        if let Err(err) = self.records.persist(&upload.public_url).await {
            // The old asset is still current; it must not be retired.
            tracing::error!(
                "Record update for {} failed, keeping previous asset: {}",
                upload.public_url,
                err
            );
            return Err(ReplaceError::Record {
                public_url: upload.public_url,
                source: err,
            });
        }

        let previous = request.previous_public_url().map(str::to_string);
        let cleanup = match (&self.cleanup, previous) {
            (Some(coordinator), Some(_)) => Some(coordinator.spawn(request, |_| {})),
            (None, Some(previous)) => {
                tracing::debug!("Cleanup backend not configured, leaving {}", previous);
                self.notifier.notify(AssetEvent::CleanupSkipped {
                    previous_url: previous,
                });
                None
            }
            _ => None,
        };

        Ok(ReplaceOutcome { upload, cleanup })
    }
}
