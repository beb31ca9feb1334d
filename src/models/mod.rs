use serde::Serialize;

/// An asset that landed on the remote host. Never mutated; a replace yields a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteAsset {
    pub remote_name: String,
    pub directory_path: String,
    pub public_url: String,
}

impl RemoteAsset {
    /// `{base_url}/{directory_path}/{remote_name}`
    pub fn new(base_url: &str, directory_path: &str, remote_name: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let public_url = if directory_path.is_empty() {
            format!("{}/{}", base, remote_name)
        } else {
            format!("{}/{}/{}", base, directory_path, remote_name)
        };

        Self {
            remote_name: remote_name.to_string(),
            directory_path: directory_path.to_string(),
            public_url,
        }
    }

    /// Path relative to the base directory, as used in SITE CHMOD
    pub fn remote_path(&self) -> String {
        if self.directory_path.is_empty() {
            self.remote_name.clone()
        } else {
            format!("{}/{}", self.directory_path, self.remote_name)
        }
    }
}

/// A non-fatal SITE CHMOD failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionWarning {
    pub path: String,
    pub mode: String,
    pub reason: String,
}

/// Result of one permission-setting pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct PermissionReport {
    pub applied: Vec<String>,
    pub failed: Vec<PermissionWarning>,
}

impl PermissionReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What the transfer client reports for a written file
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub asset: RemoteAsset,
    pub bytes_written: u64,
    /// Directories created during bootstrap, outermost first
    pub created_directories: Vec<String>,
    /// The base directory could not be entered; the login directory was used
    pub used_fallback_root: bool,
    pub permissions: PermissionReport,
}

/// Outcome of one HTTP existence check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    pub reachable: bool,
    pub http_status: Option<u16>,
}

impl VerifyReport {
    pub fn unreachable(http_status: Option<u16>) -> Self {
        Self {
            reachable: false,
            http_status,
        }
    }
}

/// Advisory attached to an otherwise successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UploadWarning {
    /// Uploaded but still not servable after the escalation cycle
    Unreachable { http_status: Option<u16> },
}

/// Result of `upload_and_confirm`: the derived half of an upload attempt
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub asset: RemoteAsset,
    pub public_url: String,
    pub verified: bool,
    pub http_status: Option<u16>,
    pub permission_escalated: bool,
    pub verify_attempts: u32,
    pub warning: Option<UploadWarning>,
}
