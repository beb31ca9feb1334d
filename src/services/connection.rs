use crate::services::ftp::FtpError;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Commands the transfer client needs from a live remote session.
/// Paths are relative to the current directory unless they start with `/`.
#[async_trait]
pub trait RemoteConnection: Send {
    async fn change_dir(&mut self, path: &str) -> Result<(), FtpError>;

    /// Entry names (no paths) in the current directory
    async fn list_names(&mut self) -> Result<Vec<String>, FtpError>;

    async fn make_dir(&mut self, name: &str) -> Result<(), FtpError>;

    /// Stores `source` under `name`, replacing any existing entry
    async fn put(
        &mut self,
        name: &str,
        source: &mut (dyn AsyncRead + Unpin + Send),
    ) -> Result<u64, FtpError>;

    /// Vendor-extension permission change (`SITE CHMOD`)
    async fn set_permissions(&mut self, path: &str, mode: &str) -> Result<(), FtpError>;

    /// Releases the session. Never fails; problems are only logged.
    async fn close(&mut self);
}

/// Opens a fresh, exclusively owned session per call.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RemoteConnection>, FtpError>;
}
