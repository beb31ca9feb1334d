use crate::config::AssetConfig;
use crate::services::cdn::{CdnDeleter, IdentifierResolver};
use crate::services::cleanup::CleanupCoordinator;
use crate::services::ftp::FtpConnector;
use crate::services::notifications::Notifier;
use crate::services::orchestrator::UploadOrchestrator;
use crate::services::transfer::TransferClient;
use crate::services::verifier::{HttpProbe, ReachabilityVerifier};
use std::sync::Arc;
use tracing::info;

pub fn setup_orchestrator(
    config: &AssetConfig,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<Arc<UploadOrchestrator>> {
    let transfer_config = config.transfer.clone();
    info!(
        "☁️  Asset storage: ftp{}://{}:{} (base dir: '{}', public: {})",
        if transfer_config.secure { "s" } else { "" },
        transfer_config.host,
        transfer_config.port,
        transfer_config.base_dir,
        transfer_config.public_base_url
    );

    let connector = Arc::new(FtpConnector::new(transfer_config.clone()));
    let transfer = TransferClient::new(connector, notifier.clone(), transfer_config);
    let probe = Arc::new(HttpProbe::new(config.verify.timeout)?);
    let verifier = ReachabilityVerifier::new(probe);

    Ok(Arc::new(UploadOrchestrator::new(transfer, verifier, notifier)))
}

/// `None` when no deletion backend is configured.
pub fn setup_cleanup(
    config: &AssetConfig,
    notifier: Arc<dyn Notifier>,
) -> Option<Arc<CleanupCoordinator>> {
    let Some(cdn) = config.cdn.clone() else {
        tracing::warn!("⚠️  CDN credentials not set, superseded assets will not be retired");
        return None;
    };

    info!("🧹 Cleanup backend: {}/{}", cdn.api_base, cdn.cloud_name);
    let resolver = IdentifierResolver::new(cdn.host.clone());
    let deleter = Arc::new(CdnDeleter::new(cdn));
    Some(Arc::new(CleanupCoordinator::new(resolver, deleter, notifier)))
}
