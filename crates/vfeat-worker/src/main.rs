//! Feature extraction binary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use vfeat_worker::{init_tracing, load_manifest, BatchDriver, ExtractionContext, RunSummary, WorkerConfig};

/// Extract vision and audio features for every clip in a manifest.
#[derive(Debug, Parser)]
#[command(name = "vfeat-extract", version)]
struct Cli {
    /// Manifest to process (`.json` array or `.jsonl`)
    manifest: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    init_tracing();
    info!("Starting vfeat-extract");

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config = WorkerConfig::from_env().context("Failed to load configuration")?;
    info!("Worker config: {:?}", config);

    let manifest = cli.manifest;
    let items = load_manifest(&manifest, &config.manifest_spec())
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;

    let ctx = ExtractionContext::from_config(&config, &manifest)
        .await
        .context("Failed to initialise extraction")?;
    info!(
        ledger = %ctx.ledger.path().display(),
        vision = ctx.vision.name(),
        audio = ctx.audio.name(),
        "Extraction context ready"
    );

    // Setup signal handler: stop starting items, let in-flight ones finish
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(true);
        }
    });

    let driver = BatchDriver::new(ctx, config.max_parallel).with_shutdown(shutdown_rx);
    let summary = driver.run(items).await;
    summary.log();

    Ok(exit_code(&summary, config.max_failure_ratio))
}

fn exit_code(summary: &RunSummary, max_failure_ratio: Option<f64>) -> ExitCode {
    if summary.stopped_early() {
        warn!(not_started = summary.not_started, "Run stopped before all items were started");
    }
    if summary.exceeds(max_failure_ratio) {
        error!(
            failed = summary.failed,
            attempted = summary.attempted(),
            "Failure ratio above EXTRACT_MAX_FAILURE_RATIO"
        );
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
