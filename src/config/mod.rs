use crate::error::ConfigError;
use std::env;
use std::time::Duration;

/// Connection and layout settings for the remote file-transfer host
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Remote host (required)
    pub host: String,

    /// Control port (default: 21)
    pub port: u16,

    /// Login user (default: "anonymous")
    pub user: String,

    /// Login credential (default: empty)
    pub password: String,

    /// Explicit FTPS via AUTH TLS (default: false)
    pub secure: bool,

    /// Web-root-like directory entered after login (default: "public_html").
    /// An empty value keeps the login directory.
    pub base_dir: String,

    /// Public base URL the uploaded assets are served from (required)
    pub public_base_url: String,

    /// Bound for connect + greeting + login (default: 10s)
    pub connect_timeout: Duration,

    /// Bound for each reply or data transfer (default: 30s)
    pub command_timeout: Duration,

    /// Mode applied to freshly created directories (default: "755")
    pub dir_mode: String,

    /// Mode applied to uploaded files (default: "644")
    pub file_mode: String,

    /// Mode used by the one escalation cycle (default: "777")
    pub escalated_mode: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 21,
            user: "anonymous".to_string(),
            password: String::new(),
            secure: false,
            base_dir: "public_html".to_string(),
            public_base_url: "http://127.0.0.1".to_string(),
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            dir_mode: "755".to_string(),
            file_mode: "644".to_string(),
            escalated_mode: "777".to_string(),
        }
    }
}

impl TransferConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        Ok(Self {
            host: required(&lookup, "FTP_HOST")?,
            port: parsed(&lookup, "FTP_PORT").unwrap_or(default.port),
            user: lookup("FTP_USER").unwrap_or(default.user),
            password: lookup("FTP_PASSWORD").unwrap_or(default.password),
            secure: flag(&lookup, "FTP_SECURE").unwrap_or(default.secure),
            base_dir: lookup("FTP_BASE_DIR")
                .map(|v| v.trim().trim_matches('/').to_string())
                .unwrap_or(default.base_dir),
            public_base_url: required(&lookup, "PUBLIC_BASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            connect_timeout: parsed(&lookup, "FTP_CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.connect_timeout),
            command_timeout: parsed(&lookup, "FTP_COMMAND_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.command_timeout),
            dir_mode: mode(&lookup, "FTP_DIR_MODE")?.unwrap_or(default.dir_mode),
            file_mode: mode(&lookup, "FTP_FILE_MODE")?.unwrap_or(default.file_mode),
            escalated_mode: mode(&lookup, "FTP_ESCALATED_MODE")?.unwrap_or(default.escalated_mode),
        })
    }

    /// Local development against a plain FTP server on localhost
    pub fn development() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2121,
            user: "dev".to_string(),
            password: "dev".to_string(),
            secure: false,
            base_dir: String::new(),
            public_base_url: "http://127.0.0.1:8080".to_string(),
            ..Self::default()
        }
    }
}

/// Settings for the HTTP existence check
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Timeout for one HEAD request (default: 10s)
    pub timeout: Duration,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

impl VerifyConfig {
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        Self {
            timeout: parsed(&lookup, "VERIFY_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.timeout),
        }
    }
}

/// Credentials for the CDN deletion backend used by cleanup
#[derive(Debug, Clone)]
pub struct CdnConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,

    /// Destroy API base (default: "https://api.cloudinary.com/v1_1")
    pub api_base: String,

    /// Only URLs on this host resolve to deletable identifiers, when set
    pub host: Option<String>,
}

impl CdnConfig {
    pub const DEFAULT_API_BASE: &'static str = "https://api.cloudinary.com/v1_1";

    /// Returns `None` when the backend is not configured; cleanup is then disabled.
    pub fn from_source<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cloud_name = lookup("CDN_CLOUD_NAME").filter(|v| !v.is_empty())?;
        let api_key = lookup("CDN_API_KEY").filter(|v| !v.is_empty())?;
        let api_secret = lookup("CDN_API_SECRET").filter(|v| !v.is_empty())?;

        Some(Self {
            cloud_name,
            api_key,
            api_secret,
            api_base: lookup("CDN_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|| Self::DEFAULT_API_BASE.to_string()),
            host: lookup("CDN_HOST").filter(|v| !v.is_empty()),
        })
    }
}

/// Everything the asset subsystem needs, loaded together
#[derive(Debug, Clone)]
pub struct AssetConfig {
    pub transfer: TransferConfig,
    pub verify: VerifyConfig,
    pub cdn: Option<CdnConfig>,
}

impl AssetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    pub fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            transfer: TransferConfig::from_source(&lookup)?,
            verify: VerifyConfig::from_source(&lookup),
            cdn: CdnConfig::from_source(&lookup),
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parsed<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn flag<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|v| {
        let v = v.trim().to_lowercase();
        v == "true" || v == "1" || v == "yes"
    })
}

// Octal permission digits as understood by SITE CHMOD
fn mode<F>(lookup: &F, key: &'static str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_string()) {
        None => Ok(None),
        Some(v) if !v.is_empty() && v.len() <= 4 && v.chars().all(|c| ('0'..='7').contains(&c)) => {
            Ok(Some(v))
        }
        Some(v) => Err(ConfigError::Invalid { key, value: v }),
    }
}
