//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

use vfeat_models::ClipIdError;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while recording progress or writing artifacts.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Progress ledger {path} is unreadable: {source}")]
    LedgerCorrupt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid clip id: {0}")]
    InvalidClipId(#[from] ClipIdError),

    #[error("Failed to write tensor: {0}")]
    Npy(#[from] ndarray_npy::WriteNpyError),

    #[error("Failed to publish {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorageError {
    pub fn ledger_corrupt(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::LedgerCorrupt {
            path: path.into(),
            source,
        }
    }

    /// Whether the error happened while opening the ledger.
    pub fn is_ledger_corrupt(&self) -> bool {
        matches!(self, Self::LedgerCorrupt { .. })
    }
}
