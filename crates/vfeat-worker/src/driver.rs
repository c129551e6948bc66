//! Resumable batch driver.
//!
//! Items move `Pending -> SkippedDone | SkippedMissing | Failed | Completed`.
//! Only `Completed` touches the ledger, and only after every artifact file
//! is on disk. Per-item errors never escape [`process_item`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, Instrument};
use uuid::Uuid;

use vfeat_encoders::{load_audio, load_vision, FeatureExtractor};
use vfeat_media::{check_ffmpeg, check_ffprobe, FfmpegTranscoder, MediaLayout, MediaResolver};
use vfeat_models::{validate_clip_id, AlignedPair, ItemState, MediaPair, WorkItem};
use vfeat_storage::{ledger_path_for, ArtifactWriter, ProgressLedger};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::ItemLogger;
use crate::metrics::record_item;

/// Long-lived collaborators shared by every item of a run.
pub struct ExtractionContext {
    pub resolver: MediaResolver,
    pub vision: Arc<dyn FeatureExtractor>,
    pub audio: Arc<dyn FeatureExtractor>,
    pub writer: ArtifactWriter,
    pub ledger: Arc<ProgressLedger>,
}

impl ExtractionContext {
    pub fn new(
        resolver: MediaResolver,
        vision: Arc<dyn FeatureExtractor>,
        audio: Arc<dyn FeatureExtractor>,
        writer: ArtifactWriter,
        ledger: Arc<ProgressLedger>,
    ) -> Self {
        Self {
            resolver,
            vision,
            audio,
            writer,
            ledger,
        }
    }

    /// Build the production context: ffmpeg tools, ONNX encoders, the
    /// manifest's ledger and the artifact writer.
    pub async fn from_config(config: &WorkerConfig, manifest: &Path) -> WorkerResult<Self> {
        check_ffmpeg()?;
        check_ffprobe()?;

        let settings = config.extractor_settings();
        let (vision_backend, audio_backend) = (config.vision_model, config.audio_model);
        let (vision, audio) = tokio::task::spawn_blocking(move || {
            Ok::<_, WorkerError>((load_vision(vision_backend, &settings)?, load_audio(audio_backend, &settings)?))
        })
        .await??;

        let ledger = ProgressLedger::open(ledger_path_for(manifest, &config.ledger_dir)).await?;

        let resolver = MediaResolver::new(
            MediaLayout::new(&config.video_root, &config.audio_root),
            Arc::new(FfmpegTranscoder::new(&config.work_dir, config.ffmpeg_timeout_secs)),
        );
        let writer = ArtifactWriter::new(&config.target_root, vision.name(), audio.name());

        Ok(Self::new(resolver, vision, audio, writer, Arc::new(ledger)))
    }
}

/// Result of processing one item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub clip_id: String,
    pub state: ItemState,
    pub error: Option<String>,
}

impl ItemOutcome {
    fn new(clip_id: &str, state: ItemState) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            state,
            error: None,
        }
    }

    fn with_error(clip_id: &str, state: ItemState, error: impl ToString) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            state,
            error: Some(error.to_string()),
        }
    }
}

/// Counts and timing for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub total: usize,
    pub completed: usize,
    pub skipped_done: usize,
    pub skipped_missing: usize,
    pub failed: usize,
    /// Items never started because a stop was requested.
    pub not_started: usize,
    pub failed_ids: Vec<String>,
}

impl RunSummary {
    fn new(run_id: Uuid, total: usize) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            elapsed_secs: 0.0,
            total,
            completed: 0,
            skipped_done: 0,
            skipped_missing: 0,
            failed: 0,
            not_started: total,
            failed_ids: Vec::new(),
        }
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        self.not_started = self.not_started.saturating_sub(1);
        match outcome.state {
            ItemState::Completed => self.completed += 1,
            ItemState::SkippedDone => self.skipped_done += 1,
            ItemState::SkippedMissing => self.skipped_missing += 1,
            ItemState::Failed => {
                self.failed += 1;
                self.failed_ids.push(outcome.clip_id.clone());
            }
            ItemState::Pending => {}
        }
    }

    /// Items that reached extraction: completed plus failed.
    pub fn attempted(&self) -> usize {
        self.completed + self.failed
    }

    /// Failed over attempted; zero when nothing was attempted.
    pub fn failure_ratio(&self) -> f64 {
        match self.attempted() {
            0 => 0.0,
            n => self.failed as f64 / n as f64,
        }
    }

    /// Whether the failure ratio is above `threshold`, if one is set.
    pub fn exceeds(&self, threshold: Option<f64>) -> bool {
        threshold.is_some_and(|t| self.failure_ratio() > t)
    }

    /// Whether a stop request cut the run short.
    pub fn stopped_early(&self) -> bool {
        self.not_started > 0
    }

    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            total = self.total,
            completed = self.completed,
            skipped_done = self.skipped_done,
            skipped_missing = self.skipped_missing,
            failed = self.failed,
            not_started = self.not_started,
            failure_ratio = format!("{:.3}", self.failure_ratio()),
            elapsed_secs = format!("{:.1}", self.elapsed_secs),
            "Run finished"
        );
    }
}

/// Drives every manifest item through extraction.
pub struct BatchDriver {
    ctx: Arc<ExtractionContext>,
    max_parallel: usize,
    shutdown: watch::Receiver<bool>,
}

impl BatchDriver {
    pub fn new(ctx: ExtractionContext, max_parallel: usize) -> Self {
        // Sender dropped: the receiver keeps reporting `false`
        let (_, shutdown) = watch::channel(false);
        Self {
            ctx: Arc::new(ctx),
            max_parallel: max_parallel.max(1),
            shutdown,
        }
    }

    /// Stop starting new items once `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn context(&self) -> &ExtractionContext {
        &self.ctx
    }

    /// Process `items`, at most `max_parallel` at a time.
    ///
    /// With `max_parallel == 1` items are handled strictly in manifest order.
    pub async fn run(&self, items: Vec<WorkItem>) -> RunSummary {
        let total = items.len();
        let run_id = Uuid::new_v4();
        let mut summary = RunSummary::new(run_id, total);
        let timer = Instant::now();

        let span = tracing::info_span!("run", run_id = %run_id, total);
        info!(
            parent: &span,
            total,
            max_parallel = self.max_parallel,
            already_done = self.ctx.ledger.len(),
            "Starting extraction run"
        );

        let shutdown = self.shutdown.clone();
        let mut outcomes = stream::iter(items.into_iter().enumerate())
            .take_while(move |_| {
                let stop = *shutdown.borrow();
                if stop {
                    info!("Stop requested, not starting further items");
                }
                futures::future::ready(!stop)
            })
            .map(|(index, item)| {
                let ctx = Arc::clone(&self.ctx);
                let logger = ItemLogger::new(&item.clip_id, "extract", index + 1, total);
                let item_span = logger.create_span();
                async move { process_item(&ctx, &item, &logger).await }.instrument(item_span)
            })
            .buffer_unordered(self.max_parallel);

        while let Some(outcome) = outcomes.next().instrument(span.clone()).await {
            summary.record(&outcome);
        }

        summary.elapsed_secs = timer.elapsed().as_secs_f64();
        summary
    }
}

/// Run one item to a terminal state. Never fails; errors become `Failed`
/// or `SkippedMissing` outcomes.
pub async fn process_item(ctx: &ExtractionContext, item: &WorkItem, logger: &ItemLogger) -> ItemOutcome {
    let timer = Instant::now();
    let clip_id = item.clip_id.as_str();

    let outcome = if ctx.ledger.is_done(clip_id) {
        logger.log_progress("already done");
        ItemOutcome::new(clip_id, ItemState::SkippedDone)
    } else {
        run_item(ctx, item, logger).await
    };

    record_item(outcome.state, timer.elapsed().as_secs_f64());
    outcome
}

async fn run_item(ctx: &ExtractionContext, item: &WorkItem, logger: &ItemLogger) -> ItemOutcome {
    let clip_id = item.clip_id.as_str();

    if let Err(e) = validate_clip_id(clip_id) {
        logger.log_error(&e.to_string());
        return ItemOutcome::with_error(clip_id, ItemState::Failed, e);
    }

    let pair = match ctx.resolver.locate(clip_id).await {
        Ok(pair) => pair,
        Err(e) if e.is_video_missing() => {
            logger.log_warning(&e.to_string());
            return ItemOutcome::with_error(clip_id, ItemState::SkippedMissing, e);
        }
        Err(e) => {
            logger.log_error(&e.to_string());
            return ItemOutcome::with_error(clip_id, ItemState::Failed, e);
        }
    };

    match ctx.resolver.ensure_audio(&pair).await {
        Ok(true) => logger.log_progress("audio transcoded"),
        Ok(false) => {}
        Err(e) => {
            logger.log_error(&format!("transcode: {e}"));
            return ItemOutcome::with_error(clip_id, ItemState::Failed, e);
        }
    }

    logger.log_start("encoding");
    match extract_and_store(ctx, item, &pair).await {
        Ok(rows) => {
            logger.log_completion(&format!("{rows} aligned rows"));
            ItemOutcome::new(clip_id, ItemState::Completed)
        }
        Err(e) => {
            logger.log_error(&e.to_string());
            ItemOutcome::with_error(clip_id, ItemState::Failed, e)
        }
    }
}

/// Extract both modalities, align, write artifacts, then record completion.
async fn extract_and_store(ctx: &ExtractionContext, item: &WorkItem, pair: &MediaPair) -> WorkerResult<usize> {
    let (vision, audio) = tokio::try_join!(
        async {
            ctx.vision
                .extract(&pair.video_path, item.window)
                .await
                .map_err(WorkerError::from)
        },
        async {
            ctx.audio
                .extract(&pair.audio_path, item.window)
                .await
                .map_err(WorkerError::from)
        },
    )?;

    let aligned = AlignedPair::new(vision, audio);
    let rows = aligned.rows();

    let writer = ctx.writer.clone();
    let clip_id = item.clip_id.clone();
    let captions = item.captions.clone();
    tokio::task::spawn_blocking(move || {
        let (vision, audio) = aligned.into_parts();
        writer.write(&clip_id, &vision, &audio, &captions)
    })
    .await??;

    // Artifacts are complete on disk before the ledger says so
    ctx.ledger.mark_done(&item.clip_id).await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(id: &str, state: ItemState) -> ItemOutcome {
        ItemOutcome::new(id, state)
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::new(Uuid::new_v4(), 5);
        summary.record(&outcome("a", ItemState::SkippedDone));
        summary.record(&outcome("b", ItemState::Completed));
        summary.record(&outcome("c", ItemState::Failed));
        summary.record(&outcome("d", ItemState::SkippedMissing));

        assert_eq!(summary.completed, 1);
        assert_eq!(summary.skipped_done, 1);
        assert_eq!(summary.skipped_missing, 1);
        assert_eq!(summary.failed_ids, vec!["c"]);
        assert_eq!(summary.not_started, 1);
        assert!(summary.stopped_early());
        assert_eq!(summary.attempted(), 2);
        assert!((summary.failure_ratio() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_failure_threshold() {
        let mut summary = RunSummary::new(Uuid::new_v4(), 4);
        assert_eq!(summary.failure_ratio(), 0.0);
        assert!(!summary.exceeds(Some(0.0)));

        for (id, state) in [
            ("a", ItemState::Completed),
            ("b", ItemState::Completed),
            ("c", ItemState::Completed),
            ("d", ItemState::Failed),
        ] {
            summary.record(&outcome(id, state));
        }

        assert!(!summary.exceeds(None));
        assert!(summary.exceeds(Some(0.2)));
        assert!(!summary.exceeds(Some(0.25)));
        assert!(!summary.stopped_early());
    }
}
