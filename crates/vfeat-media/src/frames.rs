//! Uniform frame sampling from video.

use std::path::{Path, PathBuf};
use tracing::debug;

use vfeat_models::{FrameSampling, TimeWindow};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Image sequence file pattern written by ffmpeg.
const FRAME_PATTERN: &str = "frame_%06d.png";

/// Resolved ffmpeg parameters for one sampling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan {
    /// Input seek: window start plus the sampling phase offset.
    pub seek: f64,
    /// Length of input to read after the seek.
    pub duration: f64,
    /// Output frames per second.
    pub rate: f64,
    /// Number of frames the plan yields.
    pub frame_count: usize,
}

impl FramePlan {
    /// Plan sampling over `window` (or the whole media) given its duration.
    ///
    /// Returns `None` when no sample time falls inside the range.
    pub fn new(
        sampling: &FrameSampling,
        window: Option<TimeWindow>,
        media_duration: f64,
    ) -> Option<Self> {
        let (start, end) = match window {
            Some(w) => {
                let w = w.clamp_to(media_duration)?;
                (w.start, w.end)
            }
            None => (0.0, media_duration),
        };

        let frame_count = sampling.sample_times(start, end).len();
        if frame_count == 0 {
            return None;
        }

        let seek = start + sampling.first_offset();
        Some(Self {
            seek,
            duration: end - seek,
            rate: sampling.rate,
            frame_count,
        })
    }

    fn command(&self, video: &Path, out_dir: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, out_dir.join(FRAME_PATTERN))
            .seek(self.seek)
            .duration(self.duration)
            .video_filter(format!("fps={}", self.rate))
            .output_args(["-frames:v".to_string(), self.frame_count.to_string()])
            .output_args(["-start_number", "0"])
            .log_level("error")
    }
}

/// Decode the frames of `plan` into PNG files under `out_dir`.
///
/// Returns the frame paths in temporal order.
pub async fn extract_frames(
    runner: &FfmpegRunner,
    video: &Path,
    plan: &FramePlan,
    out_dir: &Path,
) -> MediaResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir).await?;
    runner.run(&plan.command(video, out_dir)).await?;

    let mut frames = Vec::with_capacity(plan.frame_count);
    let mut entries = tokio::fs::read_dir(out_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("frame_") && n.ends_with(".png"));
        if is_frame {
            frames.push(path);
        }
    }
    // Zero-padded names sort temporally
    frames.sort();

    debug!(
        video = %video.display(),
        planned = plan.frame_count,
        decoded = frames.len(),
        "Sampled frames"
    );
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_whole_video() {
        let plan = FramePlan::new(&FrameSampling::default(), None, 10.2).unwrap();
        assert_eq!(plan.seek, 0.5);
        assert!((plan.duration - 9.7).abs() < 1e-9);
        assert_eq!(plan.frame_count, 10);
    }

    #[test]
    fn test_plan_window() {
        let window = TimeWindow::new(4.0, 8.0).unwrap();
        let plan = FramePlan::new(&FrameSampling::default(), Some(window), 60.0).unwrap();
        assert_eq!(plan.seek, 4.5);
        assert_eq!(plan.duration, 3.5);
        assert_eq!(plan.frame_count, 4);
    }

    #[test]
    fn test_plan_window_clamped_to_media() {
        let window = TimeWindow::new(4.0, 80.0).unwrap();
        let plan = FramePlan::new(&FrameSampling::default(), Some(window), 6.0).unwrap();
        assert_eq!(plan.frame_count, 2);
    }

    #[test]
    fn test_plan_empty() {
        assert!(FramePlan::new(&FrameSampling::default(), None, 0.3).is_none());
        let window = TimeWindow::new(10.0, 12.0).unwrap();
        assert!(FramePlan::new(&FrameSampling::default(), Some(window), 5.0).is_none());
    }

    #[test]
    fn test_plan_command_args() {
        let plan = FramePlan::new(&FrameSampling::new(2.0, 0.0).unwrap(), None, 3.0).unwrap();
        let args = plan
            .command(Path::new("clip.mp4"), Path::new("/tmp/frames"))
            .build_args()
            .join(" ");
        assert!(args.contains("-vf fps=2"));
        assert!(args.contains("-frames:v 6"));
        assert!(args.ends_with("/tmp/frames/frame_%06d.png"));
    }
}
