use serde::Serialize;
use tokio::sync::mpsc;

/// Observable side-effects of uploads and cleanups. Delivered without
/// blocking the flow that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AssetEvent {
    PermissionWarning {
        path: String,
        mode: String,
        reason: String,
    },
    EscalationAttempted {
        public_url: String,
        failed_paths: usize,
    },
    UploadUnverified {
        public_url: String,
        http_status: Option<u16>,
    },
    CleanupSkipped {
        previous_url: String,
    },
    CleanupSucceeded {
        identifier: String,
    },
    CleanupFailed {
        identifier: String,
        reason: String,
    },
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: AssetEvent);
}

/// Logs every event at a level matching its severity
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: AssetEvent) {
        match &event {
            AssetEvent::PermissionWarning { path, mode, reason } => {
                tracing::warn!("⚠️  Could not set mode {} on {}: {}", mode, path, reason);
            }
            AssetEvent::EscalationAttempted {
                public_url,
                failed_paths,
            } => {
                tracing::info!(
                    "🔓 Escalated permissions for {} ({} paths refused)",
                    public_url,
                    failed_paths
                );
            }
            AssetEvent::UploadUnverified {
                public_url,
                http_status,
            } => {
                tracing::warn!(
                    "⚠️  {} uploaded but not reachable (status: {:?})",
                    public_url,
                    http_status
                );
            }
            AssetEvent::CleanupSkipped { previous_url } => {
                tracing::debug!("No managed asset behind {}, nothing to clean up", previous_url);
            }
            AssetEvent::CleanupSucceeded { identifier } => {
                tracing::info!("🧹 Retired superseded asset {}", identifier);
            }
            AssetEvent::CleanupFailed { identifier, reason } => {
                tracing::error!("Failed to retire asset {}: {}", identifier, reason);
            }
        }
    }
}

/// Forwards events to an unbounded channel; a dropped receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<AssetEvent>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AssetEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: AssetEvent) {
        let _ = self.tx.send(event);
    }
}
