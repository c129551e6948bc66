//! Work items and per-item processing state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::timestamp::TimeWindow;

/// One clip to process, as loaded from the manifest.
///
/// Immutable once loaded. `captions` holds the projected manifest columns
/// (the identifier column included) in manifest column order; it is written
/// verbatim to `caption.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub clip_id: String,
    pub captions: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<TimeWindow>,
}

impl WorkItem {
    /// Create a work item without a time window.
    pub fn new(clip_id: impl Into<String>, captions: Map<String, Value>) -> Self {
        Self {
            clip_id: clip_id.into(),
            captions,
            window: None,
        }
    }

    /// Attach a time window.
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = Some(window);
        self
    }
}

/// Source media locations for one clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPair {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
}

/// Processing state of a single item within a run.
///
/// Every item starts `Pending` and reaches exactly one terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    #[default]
    Pending,
    /// Already recorded in the progress ledger.
    SkippedDone,
    /// Source video absent; retried next run.
    SkippedMissing,
    /// Transcode, extraction or write failed; retried next run.
    Failed,
    /// Artifacts written and ledger updated.
    Completed,
}

impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::SkippedDone => "skipped_done",
            ItemState::SkippedMissing => "skipped_missing",
            ItemState::Failed => "failed",
            ItemState::Completed => "completed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ItemState::Pending)
    }

    /// Whether the item will be picked up again by the next run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ItemState::SkippedMissing | ItemState::Failed)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reasons a clip id cannot be used as a directory or ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipIdError {
    #[error("clip id is empty")]
    Empty,

    #[error("clip id '{0}' contains a path separator or parent reference")]
    PathLike(String),

    #[error("clip id contains a line break")]
    LineBreak,

    #[error("clip id '{0}' has leading or trailing whitespace")]
    SurroundingWhitespace(String),
}

/// Check that a clip id is safe to use as a path component and ledger line.
pub fn validate_clip_id(clip_id: &str) -> Result<(), ClipIdError> {
    if clip_id.trim().is_empty() {
        return Err(ClipIdError::Empty);
    }
    if clip_id.contains('\n') || clip_id.contains('\r') {
        return Err(ClipIdError::LineBreak);
    }
    if clip_id.trim() != clip_id {
        return Err(ClipIdError::SurroundingWhitespace(clip_id.to_string()));
    }
    if clip_id.contains('/') || clip_id.contains('\\') || clip_id == "." || clip_id == ".." {
        return Err(ClipIdError::PathLike(clip_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_state_terminal() {
        assert!(!ItemState::Pending.is_terminal());
        assert!(ItemState::SkippedDone.is_terminal());
        assert!(ItemState::Completed.is_terminal());
        assert!(ItemState::Failed.is_retryable());
        assert!(ItemState::SkippedMissing.is_retryable());
        assert!(!ItemState::SkippedDone.is_retryable());
    }

    #[test]
    fn test_item_state_serde() {
        let json = serde_json::to_string(&ItemState::SkippedMissing).unwrap();
        assert_eq!(json, "\"skipped_missing\"");
    }

    #[test]
    fn test_validate_clip_id() {
        assert!(validate_clip_id("001").is_ok());
        assert!(validate_clip_id("-8x3kSHh9vE.12").is_ok());
        assert_eq!(validate_clip_id(""), Err(ClipIdError::Empty));
        assert_eq!(validate_clip_id("a\nb"), Err(ClipIdError::LineBreak));
        assert!(matches!(validate_clip_id("../etc"), Err(ClipIdError::PathLike(_))));
        assert!(matches!(validate_clip_id(".."), Err(ClipIdError::PathLike(_))));
        assert!(matches!(validate_clip_id(" 001"), Err(ClipIdError::SurroundingWhitespace(_))));
        assert!(matches!(validate_clip_id("001\t"), Err(ClipIdError::SurroundingWhitespace(_))));
        assert!(validate_clip_id("a b").is_ok());
    }

    #[test]
    fn test_work_item_window() {
        let item = WorkItem::new("001", Map::new()).with_window(TimeWindow::new(1.0, 4.0).unwrap());
        assert_eq!(item.window.unwrap().duration(), 3.0);
    }
}
