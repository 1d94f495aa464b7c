//! Error types for the scan engine.
//!
//! Only setup failures are surfaced to callers as hard errors. Per-file and
//! per-store failures are logged where they happen and degrade to "absent".

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the scanner.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scan root does not exist: {0}")]
    RootNotFound(PathBuf),
    #[error("scan root is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },
    #[error("invalid exclude pattern: {0}")]
    InvalidGlob(#[from] globset::Error),
}

impl ScanError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScanError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ScanError::Json {
            path: path.into(),
            source,
        }
    }

    /// Whether this error happened before any scanning began.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            ScanError::RootNotFound(_)
                | ScanError::NotADirectory(_)
                | ScanError::Config { .. }
                | ScanError::InvalidGlob(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
