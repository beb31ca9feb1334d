use crate::error::TransferError;
use crate::models::{PermissionReport, UploadOutcome, UploadWarning, VerifyReport};
use crate::services::notifications::{AssetEvent, Notifier};
use crate::services::transfer::TransferClient;
use crate::services::verifier::ReachabilityVerifier;
use crate::utils::retry::{Attempt, BoundedRetry};
use crate::utils::upload_slots::UploadSlots;
use crate::utils::validation::{directory_segments, validate_target_name};
use std::sync::Arc;
use tokio::io::AsyncRead;

/// First check plus one check after escalation, never more.
pub const VERIFY_ATTEMPTS: u32 = 2;

struct VerifyRound {
    report: VerifyReport,
    escalation: Option<Result<PermissionReport, TransferError>>,
}

/// Upload, confirm reachability, escalate permissions once if needed.
pub struct UploadOrchestrator {
    transfer: TransferClient,
    verifier: ReachabilityVerifier,
    notifier: Arc<dyn Notifier>,
    slots: UploadSlots,
}

impl UploadOrchestrator {
    pub fn new(
        transfer: TransferClient,
        verifier: ReachabilityVerifier,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transfer,
            verifier,
            notifier,
            slots: UploadSlots::new(),
        }
    }

    pub fn transfer(&self) -> &TransferClient {
        &self.transfer
    }

    /// Only connection- and write-class failures come back as errors. An
    /// upload that stays unreachable is still returned, with a warning.
    pub async fn upload_and_confirm(
        &self,
        source: &mut (dyn AsyncRead + Unpin + Send),
        target_name: &str,
        directory_path: &str,
    ) -> Result<UploadOutcome, TransferError> {
        // Keyed on the normalized target, so spellings of the same remote
        // path share one slot.
        let name = validate_target_name(target_name)?;
        let segments = directory_segments(directory_path)?;
        let key = UploadSlots::key(&segments.join("/"), name);

        let slot = self.slots.acquire(&key).await;
        let result = self.confirm_upload(source, name, directory_path).await;
        drop(slot);
        self.slots.prune();
        result
    }

    /// Targets with a live or idle upload slot
    pub fn tracked_targets(&self) -> usize {
        self.slots.len()
    }

    async fn confirm_upload(
        &self,
        source: &mut (dyn AsyncRead + Unpin + Send),
        target_name: &str,
        directory_path: &str,
    ) -> Result<UploadOutcome, TransferError> {
        let receipt = self
            .transfer
            .upload(source, target_name, directory_path)
            .await?;
        let asset = receipt.asset;
        let url = asset.public_url.as_str();

        let transfer = &self.transfer;
        let verifier = &self.verifier;
        let escalated_mode = transfer.config().escalated_mode.as_str();
        let remote_name = asset.remote_name.as_str();
        let remote_dir = asset.directory_path.as_str();

        let outcome = BoundedRetry::new(VERIFY_ATTEMPTS)
            .run(|attempt| async move {
                let escalation = if attempt > 1 {
                    tracing::info!("🔓 {} not reachable, escalating to mode {}", url, escalated_mode);
                    Some(
                        transfer
                            .set_permissions(remote_dir, remote_name, escalated_mode)
                            .await,
                    )
                } else {
                    None
                };

                let report = verifier.verify(url).await;
                let round = VerifyRound { report, escalation };
                if report.reachable {
                    Attempt::Done(round)
                } else {
                    Attempt::Retry(round)
                }
            })
            .await;

        let permission_escalated = match &outcome.value.escalation {
            Some(Ok(report)) => {
                self.notifier.notify(AssetEvent::EscalationAttempted {
                    public_url: url.to_string(),
                    failed_paths: report.failed.len(),
                });
                true
            }
            Some(Err(e)) => {
                tracing::warn!("Permission escalation for {} failed: {}", url, e);
                false
            }
            None => false,
        };

        let report = outcome.value.report;
        let warning = if report.reachable {
            None
        } else {
            self.notifier.notify(AssetEvent::UploadUnverified {
                public_url: url.to_string(),
                http_status: report.http_status,
            });
            Some(UploadWarning::Unreachable {
                http_status: report.http_status,
            })
        };

        tracing::info!(
            "✅ {} uploaded (verified: {}, attempts: {})",
            url,
            report.reachable,
            outcome.attempts
        );

        Ok(UploadOutcome {
            public_url: asset.public_url.clone(),
            asset,
            verified: report.reachable,
            http_status: report.http_status,
            permission_escalated,
            verify_attempts: outcome.attempts,
            warning,
        })
    }
}
