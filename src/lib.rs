//! SalesForge: clean a tabular sales dataset, summarize it and render charts
//!
//! The pipeline is a single linear pass: load and clean the CSV, compute
//! summary statistics, render the chart set, then print a report.

pub mod cli;
pub mod data;
pub mod error;
pub mod report;
pub mod stats;
pub mod table;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Args, PipelineConfig};
pub use data::{clean, load_and_clean, load_raw};
pub use error::PipelineError;
pub use stats::{summarize, SummaryStats};
pub use table::Table;
pub use viz::{render_all, Chart, RenderOptions, RenderSummary};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, PipelineError>;
