//! CLI entry point for the trip refinery.
//!
//! Provides subcommands for running the full clean-and-enrich pipeline over a
//! trip CSV and for reporting cleaning statistics alone.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use trip_refinery::cleaning::CleaningEngine;
use trip_refinery::config::PipelineConfig;
use trip_refinery::exclusion_log::CsvExclusionLog;
use trip_refinery::loader::{load_trips, load_zone_lookup};
use trip_refinery::output::{log_summary, print_json, print_pretty, write_enriched_file};
use trip_refinery::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "trip_refinery")]
#[command(about = "Clean and enrich taxi trip records", long_about = None)]
struct Cli {
    /// JSON config file overriding environment defaults
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a trip CSV, derive features, and write the enriched batch
    Run {
        /// Trip CSV (optionally .gz)
        #[arg(value_name = "TRIPS")]
        input: PathBuf,

        /// Taxi zone lookup CSV; zone features are omitted without it
        #[arg(short, long)]
        zones: Option<PathBuf>,

        /// Enriched CSV to write
        #[arg(short, long, default_value = "data/clean/trips_enriched.csv")]
        output: PathBuf,

        /// Directory for the rejection log and exclusion reports
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// Read at most this many trips
        #[arg(short, long)]
        limit: Option<usize>,

        /// Gzip compress the enriched CSV
        #[arg(long, default_value_t = false)]
        gzip: bool,

        /// Evaluate every stage on the calling thread
        #[arg(long, default_value_t = false)]
        no_parallel: bool,
    },
    /// Run cleaning only and print the statistics as JSON
    Stats {
        /// Trip CSV (optionally .gz)
        #[arg(value_name = "TRIPS")]
        input: PathBuf,

        /// Read at most this many trips
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/trip_refinery.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("trip_refinery.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::load(cli.config.as_deref())
        .context("failed to load pipeline configuration")?;

    match cli.command {
        Commands::Run {
            input,
            zones,
            output,
            log_dir,
            limit,
            gzip,
            no_parallel,
        } => {
            if let Some(dir) = log_dir {
                config.log_dir = dir;
            }
            if no_parallel {
                config.parallel_threshold = usize::MAX;
            }
            info!(
                input = %input.display(),
                log_dir = %config.log_dir.display(),
                parallel_threshold = config.parallel_threshold,
                "Starting pipeline run"
            );

            let batch = load_trips(&input, limit)
                .with_context(|| format!("failed to load trips from {}", input.display()))?;
            let lookup = zones
                .as_deref()
                .map(load_zone_lookup)
                .transpose()
                .context("failed to load zone lookup")?;
            let mut sink = CsvExclusionLog::new(&config.log_dir)?;

            let result =
                Pipeline::new(config.parallel_threshold).run(batch, lookup.as_ref(), &mut sink)?;

            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            write_enriched_file(&output, &result.enriched, &result.features_created, gzip)?;

            log_summary(&result.statistics);
            print_pretty(&result.statistics);
            info!(
                output = %output.display(),
                rows = result.enriched.len(),
                features = result.features_created.len(),
                "Run complete"
            );
        }
        Commands::Stats { input, limit } => {
            let batch = load_trips(&input, limit)
                .with_context(|| format!("failed to load trips from {}", input.display()))?;
            let engine = CleaningEngine::new().with_parallel_threshold(config.parallel_threshold);
            info!(stages = ?engine.stage_names(), "Running cleaning only");
            let outcome = engine.run(batch)?;

            log_summary(&outcome.statistics);
            print_json(&outcome.statistics)?;
        }
    }

    Ok(())
}
