//! Shared data models for the feature extraction pipeline.
//!
//! This crate provides plain types shared by every stage:
//! - Work items loaded from a dataset manifest
//! - Per-item processing states
//! - Time windows and timestamp parsing
//! - Frame sampling cadence
//! - Feature tensors and temporal alignment

pub mod item;
pub mod sampling;
pub mod tensor;
pub mod timestamp;

// Re-export common types
pub use item::{validate_clip_id, ClipIdError, ItemState, MediaPair, WorkItem};
pub use sampling::{FrameSampling, SamplingError};
pub use tensor::{align, AlignedPair, FeatureTensor};
pub use timestamp::{parse_timestamp, span_seconds, TimeWindow, TimestampError};
