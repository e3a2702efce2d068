//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::viz::RenderOptions;

/// Clean a sales CSV, print summary statistics and render charts
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "data/sales_data.csv")]
    pub input: PathBuf,

    /// Directory the chart images are written to (created if absent)
    #[arg(short, long, default_value = "visualizations")]
    pub output_dir: PathBuf,

    /// Symbol prefixed to currency values in the report and chart axes
    #[arg(long, default_value = "₹")]
    pub currency_symbol: String,

    /// Abort on the first chart that fails instead of rendering the rest
    #[arg(long)]
    pub fail_fast: bool,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Resolved settings passed through each pipeline stage.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub render: RenderOptions,
    pub fail_fast: bool,
}

impl Args {
    /// Validate arguments and build the pipeline configuration
    pub fn into_config(self) -> anyhow::Result<PipelineConfig> {
        if self.input.as_os_str().is_empty() {
            anyhow::bail!("Input path must not be empty");
        }
        if self.output_dir.as_os_str().is_empty() {
            anyhow::bail!("Output directory must not be empty");
        }
        if self.currency_symbol.trim().is_empty() {
            anyhow::bail!("Currency symbol must not be blank");
        }

        Ok(PipelineConfig {
            input: self.input,
            render: RenderOptions {
                output_dir: self.output_dir,
                currency_symbol: self.currency_symbol,
            },
            fail_fast: self.fail_fast,
        })
    }
}
