//! Worker error types.

use thiserror::Error;

use vfeat_models::ClipIdError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Field '{0}' is absent from every manifest record")]
    MissingField(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] vfeat_media::MediaError),

    #[error("Extraction error: {0}")]
    Encoder(#[from] vfeat_encoders::EncoderError),

    #[error("Storage error: {0}")]
    Storage(#[from] vfeat_storage::StorageError),

    #[error("Invalid clip id: {0}")]
    InvalidClipId(#[from] ClipIdError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl WorkerError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedManifest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error aborts the run rather than a single item.
    ///
    /// Only startup conditions are fatal: a bad manifest or configuration,
    /// or a ledger that exists but cannot be read.
    pub fn is_fatal(&self) -> bool {
        match self {
            WorkerError::MalformedManifest(_)
            | WorkerError::MissingField(_)
            | WorkerError::Config(_) => true,
            WorkerError::Storage(e) => e.is_ledger_corrupt(),
            _ => false,
        }
    }

    /// Whether the error means the clip's source video is absent.
    pub fn is_video_missing(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_video_missing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use vfeat_media::MediaError;
    use vfeat_storage::StorageError;

    #[test]
    fn test_fatal_classification() {
        assert!(WorkerError::malformed("not an array").is_fatal());
        assert!(WorkerError::MissingField("vast_cap".into()).is_fatal());
        assert!(WorkerError::config("bad rate").is_fatal());

        let corrupt = StorageError::ledger_corrupt(
            "x_done.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(WorkerError::from(corrupt).is_fatal());

        let missing = WorkerError::from(MediaError::VideoNotFound(PathBuf::from("clip_1.mp4")));
        assert!(!missing.is_fatal());
        assert!(missing.is_video_missing());

        let transcode = WorkerError::from(MediaError::transcode_failed("clip_1.mp4", "boom"));
        assert!(!transcode.is_fatal());
        assert!(!transcode.is_video_missing());
    }
}
