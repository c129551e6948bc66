//! Extraction metrics.
//!
//! Emitted through the `metrics` facade; nothing is recorded unless the
//! embedding process installs a recorder.

use metrics::{counter, histogram};

use vfeat_models::ItemState;

/// Metric names as constants for consistency.
pub mod names {
    pub const ITEMS_TOTAL: &str = "vfeat_items_total";
    pub const ITEM_DURATION_SECONDS: &str = "vfeat_item_duration_seconds";
    /// Incremented by the media resolver.
    pub const TRANSCODES_TOTAL: &str = "vfeat_transcodes_total";
}

/// Record an item reaching a terminal state.
pub fn record_item(state: ItemState, duration_secs: f64) {
    let labels = [("state", state.as_str().to_string())];
    counter!(names::ITEMS_TOTAL, &labels).increment(1);
    if !matches!(state, ItemState::SkippedDone) {
        histogram!(names::ITEM_DURATION_SECONDS, &labels).record(duration_secs);
    }
}
