//! The feature extraction capability shared by all encoders.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vfeat_media::FfmpegRunner;
use vfeat_models::{FeatureTensor, FrameSampling, TimeWindow};

use crate::audio::OnnxAudioExtractor;
use crate::backend::{AudioBackend, VisionBackend};
use crate::error::EncoderResult;
use crate::vision::OnnxVisionExtractor;

/// Maps raw media plus an optional time window to a `(T, D)` feature tensor.
///
/// Instances are loaded once per run and shared across items.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    /// Name used for the artifact file (`<name>.npy`).
    fn name(&self) -> &str;

    async fn extract(&self, media: &Path, window: Option<TimeWindow>) -> EncoderResult<FeatureTensor>;
}

/// Settings shared by both extractors.
#[derive(Debug, Clone)]
pub struct ExtractorSettings {
    pub model_dir: PathBuf,
    pub work_dir: PathBuf,
    pub sampling: FrameSampling,
    /// Max frames or audio rows per inference call.
    pub batch_size: usize,
    pub ffmpeg_timeout_secs: u64,
}

impl ExtractorSettings {
    pub(crate) fn runner(&self) -> FfmpegRunner {
        FfmpegRunner::new().with_timeout(self.ffmpeg_timeout_secs)
    }
}

/// Load the vision encoder for `backend`.
pub fn load_vision(
    backend: VisionBackend,
    settings: &ExtractorSettings,
) -> EncoderResult<Arc<dyn FeatureExtractor>> {
    Ok(Arc::new(OnnxVisionExtractor::load(backend, settings)?))
}

/// Load the audio encoder for `backend`.
pub fn load_audio(
    backend: AudioBackend,
    settings: &ExtractorSettings,
) -> EncoderResult<Arc<dyn FeatureExtractor>> {
    Ok(Arc::new(OnnxAudioExtractor::load(backend, settings)?))
}
