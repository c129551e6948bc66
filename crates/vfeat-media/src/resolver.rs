//! Source media resolution for clips.
//!
//! Videos live at `video_root/clip_<id>.mp4`. The matching audio track is
//! `audio_root/clip_<id>.wav`, derived from the video on first use and
//! reused afterwards.

use async_trait::async_trait;
use metrics::counter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use vfeat_models::MediaPair;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::move_file;
use crate::probe::probe_media;

/// Filesystem layout of the source dataset.
#[derive(Debug, Clone)]
pub struct MediaLayout {
    pub video_root: PathBuf,
    pub audio_root: PathBuf,
}

impl MediaLayout {
    pub fn new(video_root: impl Into<PathBuf>, audio_root: impl Into<PathBuf>) -> Self {
        Self {
            video_root: video_root.into(),
            audio_root: audio_root.into(),
        }
    }

    pub fn video_path(&self, clip_id: &str) -> PathBuf {
        self.video_root.join(format!("clip_{clip_id}.mp4"))
    }

    pub fn audio_path(&self, clip_id: &str) -> PathBuf {
        self.audio_root.join(format!("clip_{clip_id}.wav"))
    }

    pub fn pair(&self, clip_id: &str) -> MediaPair {
        MediaPair {
            video_path: self.video_path(clip_id),
            audio_path: self.audio_path(clip_id),
        }
    }
}

/// Extracts the audio track of a video into a standalone file.
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    /// Write the audio track of `video` to `audio`. `audio` must either be
    /// complete or absent when this returns.
    async fn transcode(&self, video: &Path, audio: &Path) -> MediaResult<()>;
}

/// FFmpeg-backed transcoder producing 16-bit PCM WAV at the source rate.
///
/// Resampling is left to the audio extractor so the signal is resampled
/// once, to whatever rate the encoder needs.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    runner: FfmpegRunner,
    work_dir: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(work_dir: impl Into<PathBuf>, timeout_secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(timeout_secs),
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    async fn transcode(&self, video: &Path, audio: &Path) -> MediaResult<()> {
        let info = probe_media(video).await?;
        if !info.has_audio {
            return Err(MediaError::NoAudioStream(video.to_path_buf()));
        }

        tokio::fs::create_dir_all(&self.work_dir).await?;
        // Removed on drop if anything below fails
        let scratch = tempfile::Builder::new()
            .prefix("vfeat-audio-")
            .suffix(".wav")
            .tempfile_in(&self.work_dir)?
            .into_temp_path();

        let cmd = FfmpegCommand::new(video, &scratch)
            .no_video()
            .audio_codec("pcm_s16le")
            .log_level("error");

        let total_secs = info.duration;
        let label = video.display().to_string();
        self.runner
            .run_with_progress(&cmd, move |p| {
                if p.is_complete {
                    debug!(video = %label, secs = p.out_secs(), "Transcode finished");
                } else {
                    debug!(
                        video = %label,
                        percent = format!("{:.0}", p.fraction_of(total_secs) * 100.0),
                        "Transcoding"
                    );
                }
            })
            .await
            .map_err(|e| MediaError::transcode_failed(video, e.to_string()))?;

        move_file(&scratch, audio).await?;
        Ok(())
    }
}

/// Locates clip media and derives missing audio tracks.
#[derive(Clone)]
pub struct MediaResolver {
    layout: MediaLayout,
    transcoder: Arc<dyn AudioTranscoder>,
}

impl MediaResolver {
    pub fn new(layout: MediaLayout, transcoder: Arc<dyn AudioTranscoder>) -> Self {
        Self { layout, transcoder }
    }

    pub fn layout(&self) -> &MediaLayout {
        &self.layout
    }

    /// Locate the clip's video; fails with `VideoNotFound` if it is absent.
    pub async fn locate(&self, clip_id: &str) -> MediaResult<MediaPair> {
        let pair = self.layout.pair(clip_id);
        if !tokio::fs::try_exists(&pair.video_path).await? {
            return Err(MediaError::VideoNotFound(pair.video_path));
        }
        Ok(pair)
    }

    /// Make sure the audio file exists, transcoding it from the video if not.
    ///
    /// Returns whether a transcode ran. Existence is the only check: an
    /// existing audio file is never re-derived.
    pub async fn ensure_audio(&self, pair: &MediaPair) -> MediaResult<bool> {
        if tokio::fs::try_exists(&pair.audio_path).await? {
            debug!(audio = %pair.audio_path.display(), "Audio already present");
            return Ok(false);
        }

        info!(
            video = %pair.video_path.display(),
            audio = %pair.audio_path.display(),
            "Transcoding audio track"
        );
        self.transcoder
            .transcode(&pair.video_path, &pair.audio_path)
            .await?;
        counter!("vfeat_transcodes_total").increment(1);
        Ok(true)
    }

    /// Locate the video and ensure its audio track.
    pub async fn resolve(&self, clip_id: &str) -> MediaResult<MediaPair> {
        let pair = self.locate(clip_id).await?;
        self.ensure_audio(&pair).await?;
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Writes a placeholder audio file and counts invocations.
    #[derive(Default)]
    struct CountingTranscoder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AudioTranscoder for CountingTranscoder {
        async fn transcode(&self, _video: &Path, audio: &Path) -> MediaResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(audio, b"RIFF").await?;
            Ok(())
        }
    }

    struct FailingTranscoder;

    #[async_trait]
    impl AudioTranscoder for FailingTranscoder {
        async fn transcode(&self, video: &Path, _audio: &Path) -> MediaResult<()> {
            Err(MediaError::transcode_failed(video, "boom"))
        }
    }

    fn setup() -> (TempDir, MediaLayout) {
        let dir = TempDir::new().unwrap();
        let layout = MediaLayout::new(dir.path().join("video"), dir.path().join("audio"));
        std::fs::create_dir_all(&layout.video_root).unwrap();
        std::fs::create_dir_all(&layout.audio_root).unwrap();
        (dir, layout)
    }

    #[test]
    fn test_layout_paths() {
        let layout = MediaLayout::new("/data/video", "/data/audio");
        assert_eq!(layout.video_path("abc.1"), PathBuf::from("/data/video/clip_abc.1.mp4"));
        assert_eq!(layout.audio_path("abc.1"), PathBuf::from("/data/audio/clip_abc.1.wav"));
    }

    #[tokio::test]
    async fn test_missing_video() {
        let (_dir, layout) = setup();
        let resolver = MediaResolver::new(layout, Arc::new(CountingTranscoder::default()));

        let err = resolver.resolve("404").await.unwrap_err();
        assert!(err.is_video_missing());
    }

    #[tokio::test]
    async fn test_transcode_runs_at_most_once() {
        let (_dir, layout) = setup();
        std::fs::write(layout.video_path("001"), b"mp4").unwrap();
        let transcoder = Arc::new(CountingTranscoder::default());
        let resolver = MediaResolver::new(layout.clone(), transcoder.clone());

        let first = resolver.resolve("001").await.unwrap();
        let second = resolver.resolve("001").await.unwrap();

        assert_eq!(first, second);
        assert!(first.audio_path.exists());
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_existing_audio_is_reused() {
        let (_dir, layout) = setup();
        std::fs::write(layout.video_path("002"), b"mp4").unwrap();
        std::fs::write(layout.audio_path("002"), b"wav").unwrap();
        let transcoder = Arc::new(CountingTranscoder::default());
        let resolver = MediaResolver::new(layout.clone(), transcoder.clone());

        let pair = resolver.locate("002").await.unwrap();
        assert!(!resolver.ensure_audio(&pair).await.unwrap());
        assert_eq!(transcoder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_transcode_failure_surfaces() {
        let (_dir, layout) = setup();
        std::fs::write(layout.video_path("003"), b"mp4").unwrap();
        let resolver = MediaResolver::new(layout.clone(), Arc::new(FailingTranscoder));

        let pair = resolver.locate("003").await.unwrap();
        let err = resolver.ensure_audio(&pair).await.unwrap_err();
        assert!(matches!(err, MediaError::TranscodeFailed { .. }));
        assert!(!layout.audio_path("003").exists());
    }
}
