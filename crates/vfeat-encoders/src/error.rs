//! Error types for feature extraction.

use std::path::PathBuf;
use thiserror::Error;

use vfeat_media::MediaError;

/// Result type for encoder operations.
pub type EncoderResult<T> = Result<T, EncoderError>;

/// Errors raised while loading or running an encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("Unknown {kind} backend '{name}'")]
    UnknownBackend { kind: &'static str, name: String },

    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("ONNX session error: {0}")]
    Session(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("No frames sampled from {0}")]
    NoFrames(PathBuf),

    #[error("No audio samples in {0}")]
    EmptyAudio(PathBuf),

    #[error("Unexpected tensor shape: {0}")]
    Shape(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Blocking task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl EncoderError {
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    pub fn shape(msg: impl Into<String>) -> Self {
        Self::Shape(msg.into())
    }
}

impl From<ndarray::ShapeError> for EncoderError {
    fn from(e: ndarray::ShapeError) -> Self {
        Self::Shape(e.to_string())
    }
}
