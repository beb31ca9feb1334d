use crate::services::ftp::FtpError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Pipeline stage a transfer failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStage {
    Validation,
    Connection,
    Navigation,
    Write,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferStage::Validation => "validation",
            TransferStage::Connection => "connection",
            TransferStage::Navigation => "navigation",
            TransferStage::Write => "write",
        };
        f.write_str(name)
    }
}

/// What went wrong, independent of where
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Network,
    Timeout,
    Authentication,
    PathMissing,
    PermissionDenied,
    StorageFull,
    Protocol,
    InvalidInput,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Network => "network",
            FailureKind::Timeout => "timeout",
            FailureKind::Authentication => "authentication",
            FailureKind::PathMissing => "path missing",
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::StorageFull => "storage full",
            FailureKind::Protocol => "protocol",
            FailureKind::InvalidInput => "invalid input",
        };
        f.write_str(name)
    }
}

/// A hard upload failure, tagged with the stage that produced it
#[derive(Error, Debug)]
#[error("{stage} failed ({kind}): {message}")]
pub struct TransferError {
    pub stage: TransferStage,
    pub kind: FailureKind,
    pub message: String,
    #[source]
    source: Option<FtpError>,
}

impl TransferError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            stage: TransferStage::Validation,
            kind: FailureKind::InvalidInput,
            message: message.into(),
            source: None,
        }
    }

    pub fn from_ftp(stage: TransferStage, err: FtpError) -> Self {
        let kind = classify(stage, &err);
        Self {
            stage,
            kind,
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Network hiccups and timeouts; worth retrying later
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, FailureKind::Network | FailureKind::Timeout)
    }

    /// Failures that will not go away until the host or config is fixed
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.kind,
            FailureKind::Authentication | FailureKind::PathMissing | FailureKind::PermissionDenied
        )
    }
}

fn classify(stage: TransferStage, err: &FtpError) -> FailureKind {
    match err {
        FtpError::Timeout(_) => FailureKind::Timeout,
        FtpError::Io(_) => FailureKind::Network,
        FtpError::Tls(_) | FtpError::Malformed(_) => FailureKind::Protocol,
        FtpError::Rejected { code, .. } => match (*code, stage) {
            (530 | 332, _) => FailureKind::Authentication,
            (452 | 552, _) => FailureKind::StorageFull,
            (550, TransferStage::Write) | (553, _) => FailureKind::PermissionDenied,
            (550, _) => FailureKind::PathMissing,
            (421 | 425 | 426 | 450 | 451, _) => FailureKind::Network,
            _ => FailureKind::Protocol,
        },
    }
}
