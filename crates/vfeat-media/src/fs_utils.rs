//! Filesystem helpers for publishing finished media files.
//!
//! Scratch outputs (transcoded audio) are produced in the work directory and
//! then moved next to the dataset, which may live on another filesystem.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a finished file from `src` to `dst` so that `dst` only ever appears
/// complete.
///
/// A plain rename is tried first. If that fails with EXDEV the file is
/// copied to a sibling of `dst`, synced, renamed over `dst`, and the source
/// removed.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+rename: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Create the parent directory of `path` if it is missing.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

/// Sibling path used while a copy is in flight: `clip_1.wav` -> `clip_1.wav.partial`.
fn partial_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().map(OsString::from).unwrap_or_default();
    name.push(".partial");
    dst.with_file_name(name)
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    let tmp_dst = partial_path(dst);

    if let Err(e) = fs::copy(src, &tmp_dst).await {
        tracing::error!(
            "Failed to copy file during cross-device move: {} -> {}: {}",
            src.display(),
            tmp_dst.display(),
            e
        );
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    fs::File::open(&tmp_dst).await?.sync_all().await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(MediaError::from(e));
    }

    // Source is scratch; failing to remove it only leaks a temp file
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!(
            "Failed to remove source file after cross-device move: {}: {}",
            src.display(),
            e
        );
    }

    Ok(())
}
