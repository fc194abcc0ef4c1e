mod config;
mod models;
mod pipeline;
mod provider;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::{FailurePolicy, Pipeline, TickerOutcome};
use crate::provider::YahooChartSource;
use crate::storage::CsvStore;

#[derive(Parser)]
#[command(
    name = "stock-data-downloader",
    about = "Download daily price history for a fixed ticker list to CSV",
    version
)]
struct Cli {
    /// Keep going after a ticker fails instead of stopping
    #[arg(long, env = "STOCKDL_KEEP_GOING")]
    keep_going: bool,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    // before clap, so STOCKDL_KEEP_GOING from .env is visible to it
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "stock_data_downloader=info,warn",
        1 => "stock_data_downloader=debug,info",
        _ => "trace",
    };

    // stdout is reserved for the per-ticker progress lines
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;
    if cli.keep_going {
        config.download.on_error = FailurePolicy::Continue;
    }
    let job = config.download.job()?;

    let timer = utils::Timer::start("Historical download");

    let source = YahooChartSource::new(&config.provider).context("Failed to build provider")?;
    let pipeline = Pipeline::new(source, CsvStore::new(&job.output_dir), job.on_error);

    let report = pipeline
        .run(&job.tickers, job.range, &mut std::io::stdout().lock())
        .await
        .context("Failed to write progress output")?;

    info!(
        "Done: {} downloaded | {} rows | {} failed | {} skipped | {:.2?}",
        report.downloaded(),
        report.rows_written(),
        report.failed(),
        report.skipped(),
        timer.elapsed(),
    );

    for (ticker, outcome) in &report.outcomes {
        if let TickerOutcome::Downloaded { path, rows } = outcome {
            debug!("{}: {} rows in {}", ticker, rows, path.display());
        }
    }

    report.ensure_success()?;

    Ok(())
}
