pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

pub use config::AssetConfig;
pub use error::{FailureKind, TransferError, TransferStage};
pub use models::{RemoteAsset, UploadOutcome, UploadWarning};
pub use services::cleanup::{CleanupCoordinator, CleanupOutcome, CleanupRequest, CleanupState};
pub use services::orchestrator::UploadOrchestrator;
