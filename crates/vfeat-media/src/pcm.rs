//! Audio decoding to mono f32 samples.

use std::path::Path;
use tracing::debug;

use vfeat_models::TimeWindow;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Decode `audio` to mono f32 PCM at `sample_rate`.
///
/// When a window is given only `[start, end)` is decoded. FFmpeg writes raw
/// `f32le` into a scratch file under `work_dir` which is removed afterwards.
/// An empty result is returned as-is; callers decide whether that is an error.
pub async fn decode_pcm(
    runner: &FfmpegRunner,
    audio: &Path,
    sample_rate: u32,
    window: Option<TimeWindow>,
    work_dir: &Path,
) -> MediaResult<Vec<f32>> {
    tokio::fs::create_dir_all(work_dir).await?;
    let scratch = tempfile::Builder::new()
        .prefix("vfeat-pcm-")
        .suffix(".f32")
        .tempfile_in(work_dir)?
        .into_temp_path();

    let mut cmd = FfmpegCommand::new(audio, &scratch);
    if let Some(w) = window {
        cmd = cmd.seek(w.start).duration(w.duration());
    }
    let cmd = cmd
        .no_video()
        .audio_channels(1)
        .sample_rate(sample_rate)
        .format("f32le")
        .log_level("error");

    runner.run(&cmd).await?;

    let bytes = tokio::fs::read(&scratch).await?;
    let samples = samples_from_le_bytes(&bytes);

    debug!(
        audio = %audio.display(),
        sample_rate,
        samples = samples.len(),
        "Decoded audio"
    );
    Ok(samples)
}

/// Interpret raw bytes as little-endian f32 samples. A trailing partial
/// sample is ignored.
pub fn samples_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_from_le_bytes() {
        let mut bytes = Vec::new();
        for v in [0.0f32, 0.5, -1.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(samples_from_le_bytes(&bytes), vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_trailing_partial_sample_dropped() {
        let mut bytes = 0.25f32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0x00, 0x01]);
        assert_eq!(samples_from_le_bytes(&bytes), vec![0.25]);
    }

    #[test]
    fn test_empty_input() {
        assert!(samples_from_le_bytes(&[]).is_empty());
    }
}
