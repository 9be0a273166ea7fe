//! Runs one collection pass and prints the run summary as JSON.
//!
//! Exit code: 0 when every target succeeded, 2 when some failed, 1 when
//! nothing succeeded or the run could not start.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use price_watch::{
    Collector, CollectorConfig, JsonLinesStore, MemoryStore, RecordStore, RunOutcome, RunSummary,
    ThreadSleeper, UreqTransport,
};

#[derive(Parser, Debug)]
#[command(name = "price-watch")]
#[command(about = "Collect competitor product prices")]
struct Args {
    /// JSON configuration file
    #[arg(long, short = 'c', env = "PRICE_WATCH_CONFIG")]
    config: PathBuf,

    /// Only collect these sites (can be specified multiple times)
    #[arg(long, short = 's')]
    site: Vec<String>,

    /// Directory for records.jsonl and site_runs.jsonl
    #[arg(long, short = 'o', default_value = "data")]
    output: PathBuf,

    /// Keep records in memory instead of writing them
    #[arg(long, short = 'n')]
    dry_run: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    match run(Args::parse()) {
        Ok(summary) => match summary.outcome() {
            RunOutcome::Success => ExitCode::SUCCESS,
            RunOutcome::PartialSuccess { .. } => ExitCode::from(2),
            RunOutcome::TotalFailure => ExitCode::FAILURE,
        },
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<RunSummary> {
    let config = CollectorConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let filter = (!args.site.is_empty()).then_some(args.site.as_slice());

    let summary = if args.dry_run {
        collect(config, MemoryStore::new(), filter)?
    } else {
        let store = JsonLinesStore::open(&args.output)
            .with_context(|| format!("opening output directory {}", args.output.display()))?;
        collect(config, store, filter)?
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(summary)
}

fn collect<S: RecordStore>(config: CollectorConfig, store: S, filter: Option<&[String]>) -> Result<RunSummary> {
    let transport = UreqTransport::new(&config.fetch);
    let collector = Collector::new(config, transport, store, ThreadSleeper)?;
    let summary = collector
        .run_collection(filter)
        .context("collection run aborted")?;
    Ok(summary)
}
