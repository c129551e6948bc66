//! Durable outputs of the extraction pipeline.
//!
//! This crate provides:
//! - The append-only progress ledger of completed clips
//! - Atomic per-clip artifact writing (`.npy` tensors and `caption.json`)

pub mod artifact;
pub mod error;
pub mod ledger;

pub use artifact::{ArtifactWriter, CAPTION_FILE, TENSOR_EXT};
pub use error::{StorageError, StorageResult};
pub use ledger::{ledger_path_for, ProgressLedger};
