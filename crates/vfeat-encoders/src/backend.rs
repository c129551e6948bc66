//! Supported encoder backends.
//!
//! Each backend is an ONNX export living at `<model_dir>/<name>.onnx`
//! (lower-cased). Vision graphs take normalised `[N, 3, H, W]` pixels and
//! audio graphs take raw mono waveform `[N, samples]`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::EncoderError;

const CLIP_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
const CLIP_STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];
const HALF: [f32; 3] = [0.5, 0.5, 0.5];

/// Per-channel pixel normalisation applied after scaling to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

/// Image encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisionBackend {
    Clip,
    MobileNet,
    Swin,
    Vit,
}

impl VisionBackend {
    pub const ALL: [VisionBackend; 4] = [Self::Clip, Self::MobileNet, Self::Swin, Self::Vit];

    /// Display name, also used for the artifact file name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Clip => "CLIP",
            Self::MobileNet => "MobileNet",
            Self::Swin => "Swin",
            Self::Vit => "ViT",
        }
    }

    pub fn model_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(format!("{}.onnx", self.name().to_lowercase()))
    }

    /// Graph output holding one embedding per image.
    pub fn output_name(&self) -> &'static str {
        match self {
            Self::Clip => "image_embeds",
            Self::MobileNet | Self::Swin | Self::Vit => "pooler_output",
        }
    }

    /// Square input side in pixels.
    pub fn input_size(&self) -> u32 {
        224
    }

    pub fn normalization(&self) -> Normalization {
        match self {
            Self::Clip => Normalization {
                mean: CLIP_MEAN,
                std: CLIP_STD,
            },
            Self::Swin => Normalization {
                mean: IMAGENET_MEAN,
                std: IMAGENET_STD,
            },
            Self::MobileNet | Self::Vit => Normalization {
                mean: HALF,
                std: HALF,
            },
        }
    }
}

impl fmt::Display for VisionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VisionBackend {
    type Err = EncoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EncoderError::UnknownBackend {
                kind: "vision",
                name: s.to_string(),
            })
    }
}

/// How a decoded waveform is fed to an audio graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioChunking {
    /// One row per whole second; the trailing partial second is dropped.
    OneSecondRows,
    /// The whole waveform is a single input; the output's batch axis is
    /// squeezed so its time axis becomes the rows.
    WholeWaveform,
}

/// Audio encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioBackend {
    Clap,
    Ast,
    Hubert,
    Wav2Vec2,
}

impl AudioBackend {
    pub const ALL: [AudioBackend; 4] = [Self::Clap, Self::Ast, Self::Hubert, Self::Wav2Vec2];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Clap => "CLAP",
            Self::Ast => "AST",
            Self::Hubert => "Hubert",
            Self::Wav2Vec2 => "Wav2Vec2",
        }
    }

    pub fn model_path(&self, model_dir: &Path) -> PathBuf {
        model_dir.join(format!("{}.onnx", self.name().to_lowercase()))
    }

    pub fn output_name(&self) -> &'static str {
        match self {
            Self::Clap => "audio_embeds",
            Self::Ast | Self::Hubert | Self::Wav2Vec2 => "last_hidden_state",
        }
    }

    /// Rate the waveform is decoded at before inference.
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Clap => 48_000,
            Self::Ast | Self::Hubert | Self::Wav2Vec2 => 16_000,
        }
    }

    pub fn chunking(&self) -> AudioChunking {
        match self {
            Self::Clap => AudioChunking::OneSecondRows,
            Self::Ast | Self::Hubert | Self::Wav2Vec2 => AudioChunking::WholeWaveform,
        }
    }

    /// Whether the waveform is standardised to zero mean, unit variance.
    pub fn normalizes_waveform(&self) -> bool {
        matches!(self, Self::Hubert | Self::Wav2Vec2)
    }
}

impl fmt::Display for AudioBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AudioBackend {
    type Err = EncoderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EncoderError::UnknownBackend {
                kind: "audio",
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vision_backend() {
        assert_eq!("CLIP".parse::<VisionBackend>().unwrap(), VisionBackend::Clip);
        assert_eq!("vit".parse::<VisionBackend>().unwrap(), VisionBackend::Vit);
        assert_eq!(" Swin ".parse::<VisionBackend>().unwrap(), VisionBackend::Swin);
        assert!(matches!(
            "ResNet".parse::<VisionBackend>(),
            Err(EncoderError::UnknownBackend { kind: "vision", .. })
        ));
    }

    #[test]
    fn test_parse_audio_backend() {
        assert_eq!("CLAP".parse::<AudioBackend>().unwrap(), AudioBackend::Clap);
        assert_eq!("wav2vec2".parse::<AudioBackend>().unwrap(), AudioBackend::Wav2Vec2);
        assert!("Whisper".parse::<AudioBackend>().is_err());
    }

    #[test]
    fn test_names_round_trip() {
        for b in VisionBackend::ALL {
            assert_eq!(b.to_string().parse::<VisionBackend>().unwrap(), b);
        }
        for b in AudioBackend::ALL {
            assert_eq!(b.to_string().parse::<AudioBackend>().unwrap(), b);
        }
    }

    #[test]
    fn test_model_paths() {
        let dir = Path::new("/models");
        assert_eq!(VisionBackend::Clip.model_path(dir), PathBuf::from("/models/clip.onnx"));
        assert_eq!(
            AudioBackend::Wav2Vec2.model_path(dir),
            PathBuf::from("/models/wav2vec2.onnx")
        );
    }

    #[test]
    fn test_audio_rates() {
        assert_eq!(AudioBackend::Clap.sample_rate(), 48_000);
        assert_eq!(AudioBackend::Clap.chunking(), AudioChunking::OneSecondRows);
        assert_eq!(AudioBackend::Hubert.sample_rate(), 16_000);
        assert_eq!(AudioBackend::Ast.chunking(), AudioChunking::WholeWaveform);
        assert!(!AudioBackend::Ast.normalizes_waveform());
    }
}
