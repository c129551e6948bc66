//! Manifest splitting binary.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use vfeat_worker::{init_tracing, split_manifest};

/// Split a large JSON annotation array into fixed-size manifest files.
#[derive(Debug, Parser)]
#[command(name = "vfeat-split", version)]
struct Cli {
    /// JSON array to split
    input: PathBuf,
    /// Output prefix; chunks are written to `<prefix>_<k>.json`
    output_prefix: PathBuf,
    /// Records per output file
    records_per_file: usize,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    init_tracing();

    match split_manifest(&cli.input, &cli.output_prefix, cli.records_per_file) {
        Ok(summary) => {
            info!(records = summary.records, files = summary.files.len(), "Done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Split failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
