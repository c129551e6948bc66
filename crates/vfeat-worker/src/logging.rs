//! Structured logging utilities.
//!
//! Subscriber setup for the binaries, plus consistent per-clip logging with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber: JSON when `LOG_FORMAT=json`, coloured
/// text otherwise. `RUST_LOG` adds to the default directives.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    for directive in ["vfeat=info", "ort=warn"] {
        if let Ok(d) = directive.parse() {
            env_filter = env_filter.add_directive(d);
        }
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Item logger for structured logging with consistent formatting.
///
/// Every event carries the clip id, the operation and the item's position
/// in the run (`[n/N]`).
#[derive(Debug, Clone)]
pub struct ItemLogger {
    clip_id: String,
    operation: String,
    position: usize,
    total: usize,
}

impl ItemLogger {
    /// Create a logger for the `position`-th (1-based) of `total` items.
    pub fn new(clip_id: &str, operation: &str, position: usize, total: usize) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            operation: operation.to_string(),
            position,
            total,
        }
    }

    /// `[n/N]` progress prefix.
    pub fn progress(&self) -> String {
        format!("[{}/{}]", self.position, self.total)
    }

    /// Log the start of an item.
    pub fn log_start(&self, message: &str) {
        info!(
            clip_id = %self.clip_id,
            operation = %self.operation,
            "{} {} started: {}", self.progress(), self.clip_id, message
        );
    }

    /// Log a progress update while processing an item.
    pub fn log_progress(&self, message: &str) {
        info!(
            clip_id = %self.clip_id,
            operation = %self.operation,
            "{} {}: {}", self.progress(), self.clip_id, message
        );
    }

    /// Log a recoverable condition; the item is retried next run.
    pub fn log_warning(&self, message: &str) {
        warn!(
            clip_id = %self.clip_id,
            operation = %self.operation,
            "{} {} skipped: {}", self.progress(), self.clip_id, message
        );
    }

    /// Log an item failure.
    pub fn log_error(&self, message: &str) {
        error!(
            clip_id = %self.clip_id,
            operation = %self.operation,
            "{} {} failed: {}", self.progress(), self.clip_id, message
        );
    }

    /// Log the completion of an item.
    pub fn log_completion(&self, message: &str) {
        info!(
            clip_id = %self.clip_id,
            operation = %self.operation,
            "{} {} completed: {}", self.progress(), self.clip_id, message
        );
    }

    pub fn clip_id(&self) -> &str {
        &self.clip_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this item.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "item",
            clip_id = %self.clip_id,
            operation = %self.operation,
            position = self.position,
            total = self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_logger_creation() {
        let logger = ItemLogger::new("001", "extract", 3, 10);

        assert_eq!(logger.clip_id(), "001");
        assert_eq!(logger.operation(), "extract");
        assert_eq!(logger.progress(), "[3/10]");
    }
}
