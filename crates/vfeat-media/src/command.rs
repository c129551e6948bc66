//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Number of trailing non-progress stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path (or image sequence pattern)
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set seek position (before input).
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Set duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.input_arg("-t").input_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Drop video streams from the output.
    pub fn no_video(self) -> Self {
        self.output_arg("-vn")
    }

    /// Set output audio channel count.
    pub fn audio_channels(self, channels: u16) -> Self {
        self.output_arg("-ac").output_arg(channels.to_string())
    }

    /// Set output audio sample rate.
    pub fn sample_rate(self, hz: u32) -> Self {
        self.output_arg("-ar").output_arg(hz.to_string())
    }

    /// Force the output container/raw format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Output path this command writes to.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.extend(self.input_args.clone());

        args.push("-i".to_string());
        args.push(self.input.to_string_lossy().to_string());

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and a kill timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self { timeout_secs: None }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, progress_callback: F) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("FFmpeg stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();

        // Progress lines feed the callback; everything else is kept as a tail
        // for the error report.
        let progress_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current_progress) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }

            Vec::from(tail).join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = progress_handle.await.unwrap_or_default();

        match result {
            Ok(status) if status.success() => Ok(()),
            Ok(status) => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                status.code(),
            )),
            Err(e) => Err(e),
        }
    }

    /// Wait for child process, killing it if the timeout elapses.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        let Some(timeout_secs) = self.timeout_secs else {
            return Ok(child.wait().await?);
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
            Ok(status) => Ok(status?),
            Err(_) => {
                warn!("FFmpeg timed out after {} seconds, killing process", timeout_secs);
                let _ = child.kill().await;
                Err(MediaError::Timeout(timeout_secs))
            }
        }
    }
}

/// Keys FFmpeg writes with `-progress`.
fn is_progress_line(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame", "fps", "stream_", "bitrate", "total_size", "out_time", "dup_frames",
        "drop_frames", "speed", "progress",
    ];
    match line.trim().split_once('=') {
        Some((key, _)) => KEYS.iter().any(|k| key.starts_with(k)),
        None => false,
    }
}

/// Parse a progress line from FFmpeg's -progress output.
fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let line = line.trim();

    if let Some((key, value)) = line.split_once('=') {
        match key {
            "out_time_ms" | "out_time_us" => {
                // Both keys carry microseconds in practice; normalise to ms
                if let Ok(us) = value.parse::<i64>() {
                    current.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    current.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    current.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    current.is_complete = true;
                }
                return Some(current.clone());
            }
            _ => {}
        }
    }

    None
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.wav")
            .seek(10.0)
            .duration(30.0)
            .no_video()
            .audio_codec("pcm_s16le");

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert!(args.contains(&"-ss".to_string()));
        assert!(args.contains(&"10.000".to_string()));
        assert!(args.contains(&"-vn".to_string()));
        assert!(args.contains(&"pcm_s16le".to_string()));
        assert_eq!(args.last().unwrap(), "output.wav");

        // Seek and duration go before the input
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
    }

    #[test]
    fn test_raw_pcm_args() {
        let args = FfmpegCommand::new("a.wav", "a.raw")
            .audio_channels(1)
            .sample_rate(48_000)
            .format("f32le")
            .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ac 1 -ar 48000 -f f32le a.raw"));
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        parse_progress_line("out_time_us=5000000", &mut progress);
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        parse_progress_line("speed=N/A", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let result = parse_progress_line("progress=end", &mut progress);
        assert!(result.is_some());
        assert!(progress.is_complete);
    }

    #[test]
    fn test_progress_line_detection() {
        assert!(is_progress_line("out_time_us=1000"));
        assert!(is_progress_line("stream_0_0_q=-1.0"));
        assert!(!is_progress_line("Output file #0 does not contain any stream"));
        assert!(!is_progress_line("[mp4 @ 0x55] moov atom not found"));
    }
}
