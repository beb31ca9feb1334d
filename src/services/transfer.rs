use crate::config::TransferConfig;
use crate::error::{TransferError, TransferStage};
use crate::models::{PermissionReport, PermissionWarning, RemoteAsset, UploadReceipt};
use crate::services::connection::{Connector, RemoteConnection};
use crate::services::notifications::{AssetEvent, Notifier};
use crate::utils::validation::{directory_segments, validate_target_name};
use std::sync::Arc;
use tokio::io::AsyncRead;

/// Moves byte streams onto the remote host and bootstraps the directories
/// they land in. Every call opens its own session and closes it on every
/// exit path.
pub struct TransferClient {
    connector: Arc<dyn Connector>,
    notifier: Arc<dyn Notifier>,
    config: TransferConfig,
}

impl TransferClient {
    pub fn new(
        connector: Arc<dyn Connector>,
        notifier: Arc<dyn Notifier>,
        config: TransferConfig,
    ) -> Self {
        Self {
            connector,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// The URL an upload of `target_name` into `directory_path` will have.
    pub fn public_url(
        &self,
        directory_path: &str,
        target_name: &str,
    ) -> Result<String, TransferError> {
        let name = validate_target_name(target_name)?;
        let segments = directory_segments(directory_path)?;
        Ok(RemoteAsset::new(&self.config.public_base_url, &segments.join("/"), name).public_url)
    }

    pub async fn upload(
        &self,
        source: &mut (dyn AsyncRead + Unpin + Send),
        target_name: &str,
        directory_path: &str,
    ) -> Result<UploadReceipt, TransferError> {
        let name = validate_target_name(target_name)?;
        let segments = directory_segments(directory_path)?;

        let mut conn = self.open().await?;
        let result = self.upload_with(conn.as_mut(), source, name, &segments).await;
        conn.close().await;

        match &result {
            Ok(receipt) => tracing::info!(
                "📤 Uploaded {} ({} bytes) -> {}",
                receipt.asset.remote_path(),
                receipt.bytes_written,
                receipt.asset.public_url
            ),
            Err(e) => tracing::error!("Upload of {} failed: {}", name, e),
        }
        result
    }

    /// Re-applies `mode` to every directory of `directory_path` and to the
    /// file itself. Individual refusals are reported, not raised.
    pub async fn set_permissions(
        &self,
        directory_path: &str,
        target_name: &str,
        mode: &str,
    ) -> Result<PermissionReport, TransferError> {
        let name = validate_target_name(target_name)?;
        let segments = directory_segments(directory_path)?;

        let mut conn = self.open().await?;
        self.enter_base_dir(conn.as_mut()).await;

        let mut report = PermissionReport::default();
        let mut path = String::new();
        for segment in &segments {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(segment);
            self.chmod(conn.as_mut(), &path, mode, &mut report).await;
        }
        let file_path = if path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", path, name)
        };
        self.chmod(conn.as_mut(), &file_path, mode, &mut report).await;

        conn.close().await;
        Ok(report)
    }

    async fn open(&self) -> Result<Box<dyn RemoteConnection>, TransferError> {
        self.connector.connect().await.map_err(|e| {
            tracing::error!(
                "Cannot reach storage at {}:{}: {}",
                self.config.host,
                self.config.port,
                e
            );
            TransferError::from_ftp(TransferStage::Connection, e)
        })
    }

    async fn upload_with(
        &self,
        conn: &mut dyn RemoteConnection,
        source: &mut (dyn AsyncRead + Unpin + Send),
        name: &str,
        segments: &[&str],
    ) -> Result<UploadReceipt, TransferError> {
        let used_fallback_root = !self.enter_base_dir(conn).await;

        let mut permissions = PermissionReport::default();
        let mut created_directories = Vec::new();
        for segment in segments {
            if self.ensure_directory(conn, segment).await? {
                created_directories.push(segment.to_string());
                self.chmod(conn, segment, &self.config.dir_mode, &mut permissions)
                    .await;
            }
            conn.change_dir(segment)
                .await
                .map_err(|e| TransferError::from_ftp(TransferStage::Navigation, e))?;
        }

        let bytes_written = conn
            .put(name, source)
            .await
            .map_err(|e| TransferError::from_ftp(TransferStage::Write, e))?;

        self.chmod(conn, name, &self.config.file_mode, &mut permissions)
            .await;

        Ok(UploadReceipt {
            asset: RemoteAsset::new(&self.config.public_base_url, &segments.join("/"), name),
            bytes_written,
            created_directories,
            used_fallback_root,
            permissions,
        })
    }

    /// Returns false when the base directory was unusable and the login
    /// directory is used instead.
    async fn enter_base_dir(&self, conn: &mut dyn RemoteConnection) -> bool {
        if self.config.base_dir.is_empty() {
            return true;
        }
        match conn.change_dir(&self.config.base_dir).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    "Base directory '{}' unavailable ({}), using connection root",
                    self.config.base_dir,
                    e
                );
                false
            }
        }
    }

    /// Creates `segment` in the current directory if missing. Returns
    /// whether it was created by this call.
    async fn ensure_directory(
        &self,
        conn: &mut dyn RemoteConnection,
        segment: &str,
    ) -> Result<bool, TransferError> {
        let entries = conn
            .list_names()
            .await
            .map_err(|e| TransferError::from_ftp(TransferStage::Navigation, e))?;
        if entries.iter().any(|entry| entry == segment) {
            return Ok(false);
        }

        match conn.make_dir(segment).await {
            Ok(()) => {
                tracing::info!("📁 Created remote directory {}", segment);
                Ok(true)
            }
            Err(e) => {
                // Possibly created concurrently; the following CWD decides.
                tracing::warn!("Could not create directory {}: {}", segment, e);
                Ok(false)
            }
        }
    }

    async fn chmod(
        &self,
        conn: &mut dyn RemoteConnection,
        path: &str,
        mode: &str,
        report: &mut PermissionReport,
    ) {
        match conn.set_permissions(path, mode).await {
            Ok(()) => report.applied.push(path.to_string()),
            Err(e) => {
                let warning = PermissionWarning {
                    path: path.to_string(),
                    mode: mode.to_string(),
                    reason: e.to_string(),
                };
                self.notifier.notify(AssetEvent::PermissionWarning {
                    path: warning.path.clone(),
                    mode: warning.mode.clone(),
                    reason: warning.reason.clone(),
                });
                report.failed.push(warning);
            }
        }
    }
}
