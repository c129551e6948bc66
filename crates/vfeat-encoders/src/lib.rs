//! Vision and audio feature extractors backed by ONNX Runtime.
//!
//! Backends form a closed set ([`VisionBackend`], [`AudioBackend`]); each is
//! loaded once per run behind the [`FeatureExtractor`] trait and shared by
//! every item.

pub mod audio;
pub mod backend;
pub mod error;
pub mod extractor;
pub mod session;
pub mod vision;

pub use audio::OnnxAudioExtractor;
pub use backend::{AudioBackend, AudioChunking, Normalization, VisionBackend};
pub use error::{EncoderError, EncoderResult};
pub use extractor::{load_audio, load_vision, ExtractorSettings, FeatureExtractor};
pub use session::OnnxModel;
pub use vision::OnnxVisionExtractor;
