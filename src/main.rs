//! SalesForge entrypoint: load → clean → summarize → render → report

use std::io;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use salesforge::{load_and_clean, render_all, report, summarize, Args};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // stdout carries the report; logs go to stderr
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.into_config()?;
    let start_time = Instant::now();

    // Step 1: Load and clean
    let table = load_and_clean(&config.input)
        .with_context(|| format!("Failed to prepare dataset from {}", config.input.display()))?;
    debug!(columns = ?table.column_names(), "dataset columns");

    // Step 2: Summary statistics
    let stats = summarize(&table).context("Failed to compute summary statistics")?;

    // Step 3: Charts
    let charts = render_all(&table, &config.render, config.fail_fast).context("Failed to render charts")?;

    // Step 4: Report
    report::print_report(&stats, &charts, &config.render.currency_symbol).context("Failed to write report")?;

    info!(
        elapsed_s = start_time.elapsed().as_secs_f64(),
        charts_written = charts.written.len(),
        "pipeline complete"
    );

    if !charts.is_complete() {
        anyhow::bail!("{} of {} charts failed to render", charts.failed.len(), salesforge::Chart::ALL.len());
    }
    Ok(())
}
