//! Audio feature extraction.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use vfeat_media::{decode_pcm, FfmpegRunner};
use vfeat_models::{FeatureTensor, TimeWindow};

use crate::backend::{AudioBackend, AudioChunking};
use crate::error::{EncoderError, EncoderResult};
use crate::extractor::{ExtractorSettings, FeatureExtractor};
use crate::session::OnnxModel;

pub struct OnnxAudioExtractor {
    backend: AudioBackend,
    model: Arc<OnnxModel>,
    batch_size: usize,
    work_dir: PathBuf,
    runner: FfmpegRunner,
}

impl OnnxAudioExtractor {
    pub fn load(backend: AudioBackend, settings: &ExtractorSettings) -> EncoderResult<Self> {
        let model = OnnxModel::load(&backend.model_path(&settings.model_dir), backend.output_name())?;
        Ok(Self {
            backend,
            model: Arc::new(model),
            batch_size: settings.batch_size.max(1),
            work_dir: settings.work_dir.clone(),
            runner: settings.runner(),
        })
    }
}

#[async_trait]
impl FeatureExtractor for OnnxAudioExtractor {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn extract(&self, audio: &Path, window: Option<TimeWindow>) -> EncoderResult<FeatureTensor> {
        let sample_rate = self.backend.sample_rate();
        let mut samples = decode_pcm(&self.runner, audio, sample_rate, window, &self.work_dir).await?;
        if self.backend.chunking() == AudioChunking::OneSecondRows {
            one_second_rows(&mut samples, sample_rate as usize);
        }
        if samples.is_empty() {
            return Err(EncoderError::EmptyAudio(audio.to_path_buf()));
        }

        let model = Arc::clone(&self.model);
        let backend = self.backend;
        let batch_size = self.batch_size;
        let features = tokio::task::spawn_blocking(move || {
            embed_waveform(&model, backend, samples, batch_size)
        })
        .await??;

        debug!(
            audio = %audio.display(),
            model = backend.name(),
            shape = ?features.shape(),
            "Audio features extracted"
        );
        Ok(features)
    }
}

/// Run a non-empty waveform through the model. One-second-row backends
/// expect `samples` already truncated to whole seconds.
fn embed_waveform(
    model: &OnnxModel,
    backend: AudioBackend,
    mut samples: Vec<f32>,
    batch_size: usize,
) -> EncoderResult<FeatureTensor> {
    match backend.chunking() {
        AudioChunking::OneSecondRows => {
            let rate = backend.sample_rate() as usize;
            let parts = samples
                .chunks(batch_size * rate)
                .map(|chunk| model.run(vec![chunk.len() / rate, rate], chunk.to_vec()))
                .collect::<EncoderResult<Vec<_>>>()?;
            Ok(FeatureTensor::concat_rows(&parts)?)
        }
        AudioChunking::WholeWaveform => {
            if backend.normalizes_waveform() {
                zero_mean_unit_var(&mut samples);
            }
            let len = samples.len();
            model.run(vec![1, len], samples)
        }
    }
}

/// Truncate to whole seconds and return how many there are.
pub fn one_second_rows(samples: &mut Vec<f32>, sample_rate: usize) -> usize {
    let rows = samples.len() / sample_rate;
    samples.truncate(rows * sample_rate);
    rows
}

/// Standardise in place to zero mean and unit variance.
pub fn zero_mean_unit_var(samples: &mut [f32]) {
    if samples.is_empty() {
        return;
    }
    let n = samples.len() as f32;
    let mean = samples.iter().sum::<f32>() / n;
    let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<f32>() / n;
    let denom = (var + 1e-7).sqrt();
    for s in samples.iter_mut() {
        *s = (*s - mean) / denom;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_second_rows_drops_partial() {
        let mut samples = vec![0.0; 48_000 * 3 + 1200];
        assert_eq!(one_second_rows(&mut samples, 48_000), 3);
        assert_eq!(samples.len(), 48_000 * 3);
    }

    #[test]
    fn test_one_second_rows_short_clip() {
        let mut samples = vec![0.1; 47_999];
        assert_eq!(one_second_rows(&mut samples, 48_000), 0);
        assert!(samples.is_empty());
    }

    #[test]
    fn test_zero_mean_unit_var() {
        let mut samples = vec![1.0, 2.0, 3.0, 4.0];
        zero_mean_unit_var(&mut samples);

        let mean: f32 = samples.iter().sum::<f32>() / 4.0;
        let var: f32 = samples.iter().map(|s| s * s).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        assert!((var - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_mean_unit_var_constant_signal() {
        let mut samples = vec![0.25; 16];
        zero_mean_unit_var(&mut samples);
        assert!(samples.iter().all(|s| s.abs() < 1e-3));
    }
}
