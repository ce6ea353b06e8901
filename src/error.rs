use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Errors produced while reading kernel-exposed process interfaces.
///
/// None of these are fatal to a sweep: callers record them per pid (or per
/// line) and keep going.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The subject vanished, or the interface does not exist on this kernel.
    #[error("{path} not found")]
    NotFound { path: PathBuf },

    /// Insufficient privilege to read the interface.
    #[error("permission denied reading {path}")]
    PermissionDenied { path: PathBuf },

    /// A line or field failed to parse.
    #[error("malformed record in {path}: {detail}")]
    Malformed { path: PathBuf, detail: String },

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Serialisable summary of a [`ProbeError`], used when failures are reported
/// as data instead of propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    PermissionDenied,
    Malformed,
    Io,
}

impl ProbeError {
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        let path = path.to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => ProbeError::NotFound { path },
            io::ErrorKind::PermissionDenied => ProbeError::PermissionDenied { path },
            _ => ProbeError::Io { path, source: err },
        }
    }

    pub fn malformed(path: &Path, detail: impl Into<String>) -> Self {
        ProbeError::Malformed {
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeError::NotFound { .. } => FailureKind::NotFound,
            ProbeError::PermissionDenied { .. } => FailureKind::PermissionDenied,
            ProbeError::Malformed { .. } => FailureKind::Malformed,
            ProbeError::Io { .. } => FailureKind::Io,
        }
    }

    /// `true` for the two expected skip-and-continue conditions.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProbeError::NotFound { .. } | ProbeError::PermissionDenied { .. }
        )
    }
}

pub type Result<T, E = ProbeError> = std::result::Result<T, E>;
