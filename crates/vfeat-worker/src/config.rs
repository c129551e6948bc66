//! Worker configuration.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use vfeat_encoders::{AudioBackend, ExtractorSettings, VisionBackend};
use vfeat_models::FrameSampling;

use crate::error::{WorkerError, WorkerResult};
use crate::manifest::ManifestSpec;

pub const DEFAULT_COLUMNS: &[&str] = &["clip_id", "vision_cap", "audio_cap", "subtitle", "vast_cap"];

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Source videos, `clip_<id>.mp4`
    pub video_root: PathBuf,
    /// Derived audio tracks, `clip_<id>.wav`
    pub audio_root: PathBuf,
    /// Per-clip artifact directories
    pub target_root: PathBuf,
    /// Directory holding the progress ledger
    pub ledger_dir: PathBuf,
    /// Scratch space for transcodes, frames and PCM
    pub work_dir: PathBuf,
    /// Directory holding the ONNX exports
    pub model_dir: PathBuf,
    pub vision_model: VisionBackend,
    pub audio_model: AudioBackend,
    /// Manifest identifier field
    pub id_field: String,
    /// Fields projected into `caption.json`
    pub columns: Vec<String>,
    /// Optional `[start, end]` field giving each item's time window
    pub span_field: Option<String>,
    pub sampling: FrameSampling,
    /// Max frames or audio rows per inference call
    pub batch_size: usize,
    /// Items processed concurrently
    pub max_parallel: usize,
    pub ffmpeg_timeout_secs: u64,
    /// Exit nonzero when failed/attempted exceeds this
    pub max_failure_ratio: Option<f64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            video_root: PathBuf::from("data/video"),
            audio_root: PathBuf::from("data/audio"),
            target_root: PathBuf::from("data/video_feature"),
            ledger_dir: PathBuf::from("."),
            work_dir: std::env::temp_dir(),
            model_dir: PathBuf::from("models"),
            vision_model: VisionBackend::Clip,
            audio_model: AudioBackend::Clap,
            id_field: "clip_id".to_string(),
            columns: DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            span_field: None,
            sampling: FrameSampling::default(),
            batch_size: 32,
            max_parallel: 1,
            ffmpeg_timeout_secs: 600,
            max_failure_ratio: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source. Unset or blank
    /// variables take their defaults; anything unparseable is an error.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let path_or = |key: &str, default: PathBuf| get(key).map(PathBuf::from).unwrap_or(default);

        let vision_model = match get("EXTRACT_VISION_MODEL") {
            Some(name) => name.parse::<VisionBackend>().map_err(|e| WorkerError::config(format!("{e}")))?,
            None => defaults.vision_model,
        };
        let audio_model = match get("EXTRACT_AUDIO_MODEL") {
            Some(name) => name.parse::<AudioBackend>().map_err(|e| WorkerError::config(format!("{e}")))?,
            None => defaults.audio_model,
        };

        let columns = match get("EXTRACT_COLUMNS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            None => defaults.columns,
        };

        let rate = parse_or(get("EXTRACT_FRAME_RATE"), "EXTRACT_FRAME_RATE", defaults.sampling.rate)?;
        let phase = parse_or(get("EXTRACT_FRAME_PHASE"), "EXTRACT_FRAME_PHASE", defaults.sampling.phase)?;
        let sampling = FrameSampling::new(rate, phase).map_err(|e| WorkerError::config(e.to_string()))?;

        let max_failure_ratio = get("EXTRACT_MAX_FAILURE_RATIO")
            .map(|v| parse_value::<f64>(&v, "EXTRACT_MAX_FAILURE_RATIO"))
            .transpose()?;

        let config = Self {
            video_root: path_or("EXTRACT_VIDEO_ROOT", defaults.video_root),
            audio_root: path_or("EXTRACT_AUDIO_ROOT", defaults.audio_root),
            target_root: path_or("EXTRACT_TARGET_ROOT", defaults.target_root),
            ledger_dir: path_or("EXTRACT_LEDGER_DIR", defaults.ledger_dir),
            work_dir: path_or("EXTRACT_WORK_DIR", defaults.work_dir),
            model_dir: path_or("EXTRACT_MODEL_DIR", defaults.model_dir),
            vision_model,
            audio_model,
            id_field: get("EXTRACT_ID_FIELD").unwrap_or(defaults.id_field),
            columns,
            span_field: get("EXTRACT_SPAN_FIELD"),
            sampling,
            batch_size: parse_or(get("EXTRACT_BATCH_SIZE"), "EXTRACT_BATCH_SIZE", defaults.batch_size)?,
            max_parallel: parse_or(get("EXTRACT_MAX_PARALLEL"), "EXTRACT_MAX_PARALLEL", defaults.max_parallel)?,
            ffmpeg_timeout_secs: parse_or(
                get("EXTRACT_FFMPEG_TIMEOUT"),
                "EXTRACT_FFMPEG_TIMEOUT",
                defaults.ffmpeg_timeout_secs,
            )?,
            max_failure_ratio,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.batch_size == 0 {
            return Err(WorkerError::config("EXTRACT_BATCH_SIZE must be at least 1"));
        }
        if self.max_parallel == 0 {
            return Err(WorkerError::config("EXTRACT_MAX_PARALLEL must be at least 1"));
        }
        if self.ffmpeg_timeout_secs == 0 {
            return Err(WorkerError::config("EXTRACT_FFMPEG_TIMEOUT must be at least 1"));
        }
        if self.id_field.is_empty() {
            return Err(WorkerError::config("EXTRACT_ID_FIELD must not be empty"));
        }
        if let Some(ratio) = self.max_failure_ratio {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(WorkerError::config(format!(
                    "EXTRACT_MAX_FAILURE_RATIO must be within [0, 1], got {ratio}"
                )));
            }
        }
        Ok(())
    }

    pub fn extractor_settings(&self) -> ExtractorSettings {
        ExtractorSettings {
            model_dir: self.model_dir.clone(),
            work_dir: self.work_dir.clone(),
            sampling: self.sampling,
            batch_size: self.batch_size,
            ffmpeg_timeout_secs: self.ffmpeg_timeout_secs,
        }
    }

    pub fn manifest_spec(&self) -> ManifestSpec {
        ManifestSpec {
            id_field: self.id_field.clone(),
            columns: self.columns.clone(),
            span_field: self.span_field.clone(),
        }
    }
}

fn parse_value<T>(raw: &str, key: &str) -> WorkerResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse()
        .map_err(|e| WorkerError::config(format!("invalid {key} '{raw}': {e}")))
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> WorkerResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(v) => parse_value(&v, key),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> WorkerResult<WorkerConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WorkerConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.video_root, PathBuf::from("data/video"));
        assert_eq!(config.target_root, PathBuf::from("data/video_feature"));
        assert_eq!(config.vision_model, VisionBackend::Clip);
        assert_eq!(config.audio_model, AudioBackend::Clap);
        assert_eq!(config.columns, DEFAULT_COLUMNS);
        assert_eq!(config.sampling, FrameSampling::default());
        assert_eq!(config.max_parallel, 1);
        assert!(config.span_field.is_none());
        assert!(config.max_failure_ratio.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("EXTRACT_VISION_MODEL", "vit"),
            ("EXTRACT_AUDIO_MODEL", "Wav2Vec2"),
            ("EXTRACT_COLUMNS", "clip_id, caption ,"),
            ("EXTRACT_SPAN_FIELD", "clip_span"),
            ("EXTRACT_FRAME_RATE", "2"),
            ("EXTRACT_FRAME_PHASE", "0"),
            ("EXTRACT_MAX_PARALLEL", "4"),
            ("EXTRACT_MAX_FAILURE_RATIO", "0.25"),
        ])
        .unwrap();

        assert_eq!(config.vision_model, VisionBackend::Vit);
        assert_eq!(config.audio_model, AudioBackend::Wav2Vec2);
        assert_eq!(config.columns, vec!["clip_id", "caption"]);
        assert_eq!(config.span_field.as_deref(), Some("clip_span"));
        assert_eq!(config.sampling.rate, 2.0);
        assert_eq!(config.sampling.phase, 0.0);
        assert_eq!(config.max_parallel, 4);
        assert_eq!(config.max_failure_ratio, Some(0.25));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = from_pairs(&[("EXTRACT_BATCH_SIZE", "  "), ("EXTRACT_SPAN_FIELD", "")]).unwrap();
        assert_eq!(config.batch_size, 32);
        assert!(config.span_field.is_none());
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let cases: &[(&str, &str)] = &[
            ("EXTRACT_VISION_MODEL", "ResNet"),
            ("EXTRACT_AUDIO_MODEL", "Whisper"),
            ("EXTRACT_BATCH_SIZE", "many"),
            ("EXTRACT_MAX_PARALLEL", "0"),
            ("EXTRACT_FRAME_RATE", "-1"),
            ("EXTRACT_FRAME_PHASE", "1.0"),
            ("EXTRACT_FFMPEG_TIMEOUT", "0"),
            ("EXTRACT_MAX_FAILURE_RATIO", "1.5"),
        ];
        for &(key, value) in cases {
            let err = from_pairs(&[(key, value)]).unwrap_err();
            assert!(matches!(err, WorkerError::Config(_)), "{key}={value}");
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_manifest_spec() {
        let spec = from_pairs(&[("EXTRACT_ID_FIELD", "id")]).unwrap().manifest_spec();
        assert_eq!(spec.id_field, "id");
        assert_eq!(spec.columns.len(), DEFAULT_COLUMNS.len());
    }
}
