//! Per-clip feature artifacts.
//!
//! Layout: `target_root/<clip_id>/{<vision>.npy, <audio>.npy, caption.json}`.
//! Every file is written to a temp file in the clip directory, synced, then
//! renamed into place, so readers never see a partial file. The clip
//! directory is synced before `write` returns.

use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use ndarray_npy::WriteNpyExt;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::debug;

use vfeat_models::{validate_clip_id, FeatureTensor};

use crate::error::{StorageError, StorageResult};

pub const CAPTION_FILE: &str = "caption.json";
pub const TENSOR_EXT: &str = "npy";

/// Writes the artifact directory of each completed clip.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    target_root: PathBuf,
    vision_name: String,
    audio_name: String,
}

impl ArtifactWriter {
    /// `vision_name` and `audio_name` name the tensor files.
    pub fn new(
        target_root: impl Into<PathBuf>,
        vision_name: impl Into<String>,
        audio_name: impl Into<String>,
    ) -> Self {
        Self {
            target_root: target_root.into(),
            vision_name: vision_name.into(),
            audio_name: audio_name.into(),
        }
    }

    pub fn clip_dir(&self, clip_id: &str) -> PathBuf {
        self.target_root.join(clip_id)
    }

    pub fn vision_path(&self, clip_id: &str) -> PathBuf {
        self.clip_dir(clip_id)
            .join(format!("{}.{TENSOR_EXT}", self.vision_name))
    }

    pub fn audio_path(&self, clip_id: &str) -> PathBuf {
        self.clip_dir(clip_id)
            .join(format!("{}.{TENSOR_EXT}", self.audio_name))
    }

    pub fn caption_path(&self, clip_id: &str) -> PathBuf {
        self.clip_dir(clip_id).join(CAPTION_FILE)
    }

    /// Whether all three artifact files exist.
    pub fn is_complete(&self, clip_id: &str) -> bool {
        [
            self.vision_path(clip_id),
            self.audio_path(clip_id),
            self.caption_path(clip_id),
        ]
        .iter()
        .all(|p| p.is_file())
    }

    /// Write the clip's tensors and captions. Blocking; existing files are
    /// replaced.
    pub fn write(
        &self,
        clip_id: &str,
        vision: &FeatureTensor,
        audio: &FeatureTensor,
        captions: &Map<String, Value>,
    ) -> StorageResult<PathBuf> {
        validate_clip_id(clip_id)?;

        let dir = self.clip_dir(clip_id);
        let created = !dir.is_dir();
        match std::fs::create_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        write_atomic(&self.vision_path(clip_id), |w| {
            vision.as_array().write_npy(w)?;
            Ok(())
        })?;
        write_atomic(&self.audio_path(clip_id), |w| {
            audio.as_array().write_npy(w)?;
            Ok(())
        })?;
        write_atomic(&self.caption_path(clip_id), |w| {
            serde_json::to_writer_pretty(&mut *w, captions)?;
            w.write_all(b"\n")?;
            Ok(())
        })?;

        // Renames are durable only once the directories holding them are synced
        sync_dir(&dir)?;
        if created {
            sync_dir(&self.target_root)?;
        }

        debug!(
            clip_id,
            dir = %dir.display(),
            vision = ?vision.shape(),
            audio = ?audio.shape(),
            "Artifacts written"
        );
        Ok(dir)
    }
}

/// Write `dest` through a synced sibling temp file and an atomic rename.
fn write_atomic<F>(dest: &Path, fill: F) -> StorageResult<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> StorageResult<()>,
{
    let dir = dest
        .parent()
        .ok_or_else(|| StorageError::Io(std::io::Error::new(ErrorKind::InvalidInput, "no parent dir")))?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        fill(&mut writer)?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(dest).map_err(|e| StorageError::Persist {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Flush a directory's entries to stable storage.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> StorageResult<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> StorageResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use ndarray_npy::read_npy;
    use serde_json::json;
    use tempfile::TempDir;

    fn captions() -> Map<String, Value> {
        let Value::Object(map) = json!({"clip_id": "001", "caption": "a dog"}) else {
            unreachable!()
        };
        map
    }

    fn tensor(rows: usize, dim: usize) -> FeatureTensor {
        let data = (0..rows * dim).map(|v| v as f32).collect();
        FeatureTensor::from_shape_vec(rows, dim, data).unwrap()
    }

    #[test]
    fn test_write_layout() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), "CLIP", "CLAP");

        let out = writer.write("001", &tensor(3, 4), &tensor(3, 2), &captions()).unwrap();

        assert_eq!(out, dir.path().join("001"));
        assert!(out.join("CLIP.npy").is_file());
        assert!(out.join("CLAP.npy").is_file());
        assert!(writer.is_complete("001"));

        let caption: Value =
            serde_json::from_str(&std::fs::read_to_string(out.join("caption.json")).unwrap()).unwrap();
        assert_eq!(caption, json!({"clip_id": "001", "caption": "a dog"}));
    }

    #[test]
    fn test_tensor_readback() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), "ViT", "Hubert");
        let vision = tensor(5, 3);

        writer.write("abc", &vision, &tensor(5, 2), &captions()).unwrap();

        let back: Array2<f32> = read_npy(writer.vision_path("abc")).unwrap();
        assert_eq!(&back, vision.as_array());
    }

    #[test]
    fn test_caption_key_order_preserved() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), "CLIP", "CLAP");
        let mut map = Map::new();
        map.insert("clip_id".into(), json!("7"));
        map.insert("vision_cap".into(), json!(["x"]));
        map.insert("audio_cap".into(), Value::Null);

        writer.write("7", &tensor(1, 1), &tensor(1, 1), &map).unwrap();

        let text = std::fs::read_to_string(writer.caption_path("7")).unwrap();
        let a = text.find("clip_id").unwrap();
        let b = text.find("vision_cap").unwrap();
        let c = text.find("audio_cap").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_rewrite_existing_dir() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path(), "CLIP", "CLAP");

        writer.write("001", &tensor(2, 2), &tensor(2, 2), &captions()).unwrap();
        writer.write("001", &tensor(4, 2), &tensor(4, 2), &captions()).unwrap();

        let back: Array2<f32> = read_npy(writer.audio_path("001")).unwrap();
        assert_eq!(back.nrows(), 4);
        let leftovers = std::fs::read_dir(writer.clip_dir("001")).unwrap().count();
        assert_eq!(leftovers, 3);
    }

    #[test]
    fn test_write_into_fresh_target_root() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("features").join("train"), "CLIP", "CLAP");

        let out = writer.write("001", &tensor(2, 2), &tensor(2, 2), &captions()).unwrap();

        assert!(writer.is_complete("001"));
        assert_eq!(out, dir.path().join("features/train/001"));
    }

    #[cfg(unix)]
    #[test]
    fn test_sync_dir() {
        let dir = TempDir::new().unwrap();
        sync_dir(dir.path()).unwrap();
        assert!(sync_dir(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("target"), "CLIP", "CLAP");

        let err = writer
            .write("../escape", &tensor(1, 1), &tensor(1, 1), &captions())
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidClipId(_)));
        assert!(!dir.path().join("escape").exists());
    }
}
