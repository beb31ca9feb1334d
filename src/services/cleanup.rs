use crate::services::cdn::{AssetDeleter, DeletionStatus, IdentifierResolver};
use crate::services::notifications::{AssetEvent, Notifier};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupState {
    /// No previous asset known
    Idle,
    CleanupPending,
    CleanupAttempted,
    Settled,
}

impl CleanupState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CleanupState::Idle,
            1 => CleanupState::CleanupPending,
            2 => CleanupState::CleanupAttempted,
            _ => CleanupState::Settled,
        }
    }
}

/// Retirement of one superseded asset. The state only moves forward, so a
/// request can be claimed exactly once no matter how often it is handed in.
#[derive(Debug)]
pub struct CleanupRequest {
    previous_public_url: Option<String>,
    state: AtomicU8,
}

impl CleanupRequest {
    pub fn new(previous_public_url: Option<String>) -> Self {
        let previous_public_url = previous_public_url.filter(|url| !url.trim().is_empty());
        let state = if previous_public_url.is_some() {
            CleanupState::CleanupPending
        } else {
            CleanupState::Idle
        };
        Self {
            previous_public_url,
            state: AtomicU8::new(state as u8),
        }
    }

    /// Request for a replace that swaps `previous` for `current`. When both
    /// are the same URL the record still points at it, so nothing is retired.
    pub fn for_replacement(previous: Option<&str>, current: &str) -> Self {
        let previous = previous.filter(|p| p.trim() != current.trim());
        Self::new(previous.map(str::to_string))
    }

    pub fn previous_public_url(&self) -> Option<&str> {
        self.previous_public_url.as_deref()
    }

    pub fn state(&self) -> CleanupState {
        CleanupState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// The guard flag: true for exactly one caller.
    fn claim(&self) -> bool {
        self.state
            .compare_exchange(
                CleanupState::CleanupPending as u8,
                CleanupState::CleanupAttempted as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn settle(&self) {
        self.state
            .store(CleanupState::Settled as u8, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// No previous asset; nothing was ever pending
    Idle,
    /// Another invocation already claimed this request
    AlreadyHandled,
    /// URL is not managed by this backend
    Skipped,
    Deleted { identifier: String },
    NotFound { identifier: String },
    Failed { identifier: String, reason: String },
}

/// Retires superseded assets without ever failing the caller.
pub struct CleanupCoordinator {
    resolver: IdentifierResolver,
    deleter: Arc<dyn AssetDeleter>,
    notifier: Arc<dyn Notifier>,
}

impl CleanupCoordinator {
    pub fn new(
        resolver: IdentifierResolver,
        deleter: Arc<dyn AssetDeleter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            resolver,
            deleter,
            notifier,
        }
    }

    pub async fn run(&self, request: &CleanupRequest) -> CleanupOutcome {
        self.retire(request, |_| {}).await
    }

    /// `on_settled` fires once, from the invocation that claimed the request,
    /// whatever the deletion result. Repeat invocations return
    /// `AlreadyHandled` and leave the callback untouched.
    pub async fn retire<F>(&self, request: &CleanupRequest, on_settled: F) -> CleanupOutcome
    where
        F: FnOnce(&CleanupOutcome) + Send,
    {
        let Some(previous_url) = request.previous_public_url() else {
            return CleanupOutcome::Idle;
        };

        if !request.claim() {
            tracing::debug!("Cleanup for {} already claimed", previous_url);
            return CleanupOutcome::AlreadyHandled;
        }

        let outcome = match self.resolver.resolve(previous_url) {
            None => {
                self.notifier.notify(AssetEvent::CleanupSkipped {
                    previous_url: previous_url.to_string(),
                });
                CleanupOutcome::Skipped
            }
            Some(identifier) => self.delete_once(identifier).await,
        };

        request.settle();
        on_settled(&outcome);
        outcome
    }

    async fn delete_once(&self, identifier: String) -> CleanupOutcome {
        tracing::info!("🧹 Retiring superseded asset {}", identifier);
        match self.deleter.delete(&identifier).await {
            Ok(DeletionStatus::Deleted) => {
                self.notifier.notify(AssetEvent::CleanupSucceeded {
                    identifier: identifier.clone(),
                });
                CleanupOutcome::Deleted { identifier }
            }
            Ok(DeletionStatus::NotFound) => {
                tracing::info!("Asset {} was already gone", identifier);
                self.notifier.notify(AssetEvent::CleanupSucceeded {
                    identifier: identifier.clone(),
                });
                CleanupOutcome::NotFound { identifier }
            }
            Err(e) => {
                let reason = e.to_string();
                self.notifier.notify(AssetEvent::CleanupFailed {
                    identifier: identifier.clone(),
                    reason: reason.clone(),
                });
                CleanupOutcome::Failed { identifier, reason }
            }
        }
    }

    /// Runs the cleanup in the background; the caller need not wait.
    pub fn spawn<F>(
        self: &Arc<Self>,
        request: Arc<CleanupRequest>,
        on_settled: F,
    ) -> JoinHandle<CleanupOutcome>
    where
        F: FnOnce(&CleanupOutcome) + Send + 'static,
    {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move { coordinator.retire(&request, on_settled).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_states() {
        assert_eq!(CleanupRequest::new(None).state(), CleanupState::Idle);
        assert_eq!(
            CleanupRequest::new(Some("   ".to_string())).state(),
            CleanupState::Idle
        );
        assert_eq!(
            CleanupRequest::new(Some("https://a/v1/x.png".to_string())).state(),
            CleanupState::CleanupPending
        );
    }

    #[test]
    fn test_claim_is_one_shot() {
        let request = CleanupRequest::new(Some("https://a/v1/x.png".to_string()));
        assert!(request.claim());
        assert_eq!(request.state(), CleanupState::CleanupAttempted);
        assert!(!request.claim());

        request.settle();
        assert_eq!(request.state(), CleanupState::Settled);
        assert!(!request.claim());
    }

    #[test]
    fn test_replacement_never_targets_current_value() {
        let same = CleanupRequest::for_replacement(
            Some("https://cdn.example.com/resource/v1/a.png"),
            "https://cdn.example.com/resource/v1/a.png",
        );
        assert_eq!(same.state(), CleanupState::Idle);

        let replaced = CleanupRequest::for_replacement(
            Some("https://cdn.example.com/resource/v1/a.png"),
            "https://cdn.example.com/resource/v2/b.png",
        );
        assert_eq!(replaced.state(), CleanupState::CleanupPending);
        assert_eq!(
            replaced.previous_public_url(),
            Some("https://cdn.example.com/resource/v1/a.png")
        );
    }
}
