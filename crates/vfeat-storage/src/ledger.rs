//! Append-only record of completed clips.
//!
//! The ledger is a plain text file with one clip id per line. It is replayed
//! into memory on open and only ever appended to afterwards; every append is
//! flushed to stable storage before `mark_done` returns.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use vfeat_models::validate_clip_id;

use crate::error::{StorageError, StorageResult};

/// Ledger file for a manifest: `<dir>/<manifest stem>_done.txt`.
pub fn ledger_path_for(manifest: &Path, dir: &Path) -> PathBuf {
    let stem = manifest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest".to_string());
    dir.join(format!("{stem}_done.txt"))
}

/// Byte length of the complete records; anything after the last newline is
/// a torn append and may end inside a multi-byte character.
fn complete_len(bytes: &[u8]) -> usize {
    bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1)
}

/// Recorded ids of complete ledger contents. Lines are taken verbatim;
/// recorded ids never carry surrounding whitespace.
fn replay(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Durable set of completed clip ids.
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    done: RwLock<HashSet<String>>,
    /// Held across write + sync so appends never interleave.
    file: Mutex<File>,
}

impl ProgressLedger {
    /// Open the ledger at `path`, creating it if missing, and replay it.
    ///
    /// A missing or empty file is a fresh ledger. A file that exists but
    /// cannot be read is `LedgerCorrupt`.
    pub async fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();

        let (done, torn) = match tokio::fs::read(&path).await {
            Ok(mut bytes) => {
                let valid_len = complete_len(&bytes);
                let torn = (valid_len < bytes.len()).then_some(valid_len as u64);
                bytes.truncate(valid_len);
                let contents = String::from_utf8(bytes).map_err(|e| {
                    StorageError::ledger_corrupt(&path, std::io::Error::new(ErrorKind::InvalidData, e))
                })?;
                (replay(&contents), torn)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => (HashSet::new(), None),
            Err(e) => return Err(StorageError::ledger_corrupt(&path, e)),
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let Some(valid_len) = torn {
            warn!(ledger = %path.display(), "Dropping unterminated trailing ledger record");
            let file = OpenOptions::new()
                .write(true)
                .open(&path)
                .await
                .map_err(|e| StorageError::ledger_corrupt(&path, e))?;
            file.set_len(valid_len).await?;
            file.sync_all().await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::ledger_corrupt(&path, e))?;

        info!(ledger = %path.display(), completed = done.len(), "Progress ledger loaded");

        Ok(Self {
            path,
            done: RwLock::new(done),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_done(&self, clip_id: &str) -> bool {
        self.done
            .read()
            .map(|done| done.contains(clip_id))
            .unwrap_or(false)
    }

    /// Number of completed ids.
    pub fn len(&self) -> usize {
        self.done.read().map(|done| done.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the completed ids.
    pub fn completed(&self) -> HashSet<String> {
        self.done.read().map(|done| done.clone()).unwrap_or_default()
    }

    /// Durably record `clip_id` as complete.
    ///
    /// Returns once the record is on stable storage. Recording an id that is
    /// already present is a no-op.
    pub async fn mark_done(&self, clip_id: &str) -> StorageResult<()> {
        validate_clip_id(clip_id)?;

        let mut file = self.file.lock().await;
        if self.is_done(clip_id) {
            debug!(clip_id, "Clip already recorded");
            return Ok(());
        }

        let record = format!("{clip_id}\n");
        file.write_all(record.as_bytes()).await?;
        file.sync_data().await?;

        if let Ok(mut done) = self.done.write() {
            done.insert(clip_id.to_string());
        }
        debug!(clip_id, "Clip recorded in ledger");
        Ok(())
    }
}
