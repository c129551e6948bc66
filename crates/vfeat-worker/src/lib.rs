//! Resumable feature-extraction worker.
//!
//! This crate provides:
//! - Manifest loading and splitting
//! - Environment configuration
//! - The batch driver with its skip-if-done ledger check
//! - Per-item logging and metrics

pub mod config;
pub mod driver;
pub mod error;
pub mod logging;
pub mod manifest;
pub mod metrics;
pub mod split;

pub use config::{WorkerConfig, DEFAULT_COLUMNS};
pub use driver::{process_item, BatchDriver, ExtractionContext, ItemOutcome, RunSummary};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, ItemLogger};
pub use manifest::{load_manifest, project, ManifestSpec};
pub use split::{chunk_path, split_manifest, SplitSummary};
