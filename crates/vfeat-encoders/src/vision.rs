//! Vision feature extraction: uniformly sampled frames through an image
//! encoder, one embedding row per frame.

use async_trait::async_trait;
use image::imageops::FilterType;
use image::DynamicImage;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use vfeat_media::{extract_frames, get_duration, FfmpegRunner, FramePlan};
use vfeat_models::{FeatureTensor, FrameSampling, TimeWindow};

use crate::backend::{Normalization, VisionBackend};
use crate::error::{EncoderError, EncoderResult};
use crate::extractor::{ExtractorSettings, FeatureExtractor};
use crate::session::OnnxModel;

pub struct OnnxVisionExtractor {
    backend: VisionBackend,
    model: Arc<OnnxModel>,
    sampling: FrameSampling,
    batch_size: usize,
    work_dir: PathBuf,
    runner: FfmpegRunner,
}

impl OnnxVisionExtractor {
    pub fn load(backend: VisionBackend, settings: &ExtractorSettings) -> EncoderResult<Self> {
        let model = OnnxModel::load(&backend.model_path(&settings.model_dir), backend.output_name())?;
        Ok(Self {
            backend,
            model: Arc::new(model),
            sampling: settings.sampling,
            batch_size: settings.batch_size.max(1),
            work_dir: settings.work_dir.clone(),
            runner: settings.runner(),
        })
    }
}

#[async_trait]
impl FeatureExtractor for OnnxVisionExtractor {
    fn name(&self) -> &str {
        self.backend.name()
    }

    async fn extract(&self, video: &Path, window: Option<TimeWindow>) -> EncoderResult<FeatureTensor> {
        let duration = get_duration(video).await?;
        let plan = FramePlan::new(&self.sampling, window, duration)
            .ok_or_else(|| EncoderError::NoFrames(video.to_path_buf()))?;

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let frames_dir = tempfile::Builder::new()
            .prefix("vfeat-frames-")
            .tempdir_in(&self.work_dir)?;

        let frames = extract_frames(&self.runner, video, &plan, frames_dir.path()).await?;
        if frames.is_empty() {
            return Err(EncoderError::NoFrames(video.to_path_buf()));
        }

        let model = Arc::clone(&self.model);
        let backend = self.backend;
        let batch_size = self.batch_size;
        let features =
            tokio::task::spawn_blocking(move || embed_frames(&model, backend, &frames, batch_size))
                .await??;

        debug!(
            video = %video.display(),
            model = backend.name(),
            shape = ?features.shape(),
            "Vision features extracted"
        );
        Ok(features)
    }
}

/// Preprocess frames in parallel and run them through the model in batches.
fn embed_frames(
    model: &OnnxModel,
    backend: VisionBackend,
    frames: &[PathBuf],
    batch_size: usize,
) -> EncoderResult<FeatureTensor> {
    let size = backend.input_size();
    let norm = backend.normalization();
    let plane = 3 * (size as usize) * (size as usize);

    let mut parts = Vec::with_capacity(frames.len().div_ceil(batch_size));
    for batch in frames.chunks(batch_size) {
        let pixels = batch
            .par_iter()
            .map(|path| image::open(path).map(|img| preprocess_image(&img, size, &norm)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut data = Vec::with_capacity(batch.len() * plane);
        for chw in pixels {
            data.extend(chw);
        }
        let shape = vec![batch.len(), 3, size as usize, size as usize];
        parts.push(model.run(shape, data)?);
    }

    Ok(FeatureTensor::concat_rows(&parts)?)
}

/// Resize-to-fill and center-crop to `size`, then lay out normalised pixels
/// as CHW.
pub fn preprocess_image(img: &DynamicImage, size: u32, norm: &Normalization) -> Vec<f32> {
    let rgb = img.resize_to_fill(size, size, FilterType::CatmullRom).to_rgb8();
    let (w, h) = (size as usize, size as usize);

    let mut chw: Vec<f32> = Vec::with_capacity(3 * h * w);
    for c in 0..3 {
        for y in 0..h {
            for x in 0..w {
                let pixel = rgb.get_pixel(x as u32, y as u32);
                chw.push((pixel[c] as f32 / 255.0 - norm.mean[c]) / norm.std[c]);
            }
        }
    }
    chw
}
