//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Video not found: {0}")]
    VideoNotFound(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Transcode of {video} failed: {message}")]
    TranscodeFailed { video: PathBuf, message: String },

    #[error("No audio stream in {0}")]
    NoAudioStream(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a transcode failure error.
    pub fn transcode_failed(video: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TranscodeFailed {
            video: video.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the source video is absent.
    pub fn is_video_missing(&self) -> bool {
        matches!(self, MediaError::VideoNotFound(_))
    }
}
