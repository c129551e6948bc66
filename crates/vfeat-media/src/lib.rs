#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for clip media.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with a kill timeout
//! - Progress parsing from `-progress pipe:2`
//! - Clip media resolution and on-demand audio transcoding
//! - Frame sampling and PCM decoding for the feature encoders

pub mod command;
pub mod error;
pub mod frames;
pub mod fs_utils;
pub mod pcm;
pub mod probe;
pub mod progress;
pub mod resolver;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{extract_frames, FramePlan};
pub use fs_utils::move_file;
pub use pcm::decode_pcm;
pub use probe::{get_duration, probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use resolver::{AudioTranscoder, FfmpegTranscoder, MediaLayout, MediaResolver};
