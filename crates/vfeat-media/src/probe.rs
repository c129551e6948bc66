//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Media file information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds (0 when the container does not report one)
    pub duration: f64,
    /// Whether a video stream is present
    pub has_video: bool,
    /// Whether an audio stream is present
    pub has_audio: bool,
    /// Video frame rate (fps), if there is a video stream
    pub fps: Option<f64>,
    /// Audio sample rate in Hz, if there is an audio stream
    pub sample_rate: Option<u32>,
    /// Audio channel count, if there is an audio stream
    pub channels: Option<u16>,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u16>,
}

/// Probe a media file for information.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Get media duration in seconds.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_media(path).await?.duration)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let video = probe.streams.iter().find(|s| s.codec_type == "video");
    let audio = probe.streams.iter().find(|s| s.codec_type == "audio");

    if video.is_none() && audio.is_none() {
        return Err(MediaError::InvalidMedia("no audio or video streams".to_string()));
    }

    let fps = video.and_then(|v| {
        v.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| v.r_frame_rate.as_deref().and_then(parse_frame_rate))
    });

    Ok(MediaInfo {
        duration,
        has_video: video.is_some(),
        has_audio: audio.is_some(),
        fps,
        sample_rate: audio.and_then(|a| a.sample_rate.as_ref()?.parse().ok()),
        channels: audio.and_then(|a| a.channels),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_probe_output_with_audio() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "avg_frame_rate": "25/1", "r_frame_rate": "25/1"},
                {"codec_type": "audio", "sample_rate": "44100", "channels": 2}
            ],
            "format": {"duration": "12.480000"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!(info.has_video);
        assert!(info.has_audio);
        assert_eq!(info.sample_rate, Some(44100));
        assert_eq!(info.channels, Some(2));
        assert!((info.duration - 12.48).abs() < 1e-9);
        assert!((info.fps.unwrap() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_output_silent_video() {
        let json = br#"{
            "streams": [{"codec_type": "video", "avg_frame_rate": "0/0", "r_frame_rate": "30/1"}],
            "format": {"duration": "3.0"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!(!info.has_audio);
        assert_eq!(info.sample_rate, None);
        assert!((info.fps.unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_probe_output_no_streams() {
        let json = br#"{"streams": [], "format": {}}"#;
        assert!(matches!(parse_probe_output(json), Err(MediaError::InvalidMedia(_))));
    }
}
