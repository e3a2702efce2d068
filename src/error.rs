//! Error taxonomy for the sales pipeline

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the load, summarize and render stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input file missing, unreadable, or not parseable as a table.
    #[error("failed to load '{}': {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Required column absent, or dataset empty after cleaning.
    #[error("schema error: {0}")]
    Schema(String),

    /// A chart could not compute its aggregation or could not be drawn.
    #[error("failed to render {chart}: {reason}")]
    Render { chart: &'static str, reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PipelineError {
    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn missing_column(name: &str) -> Self {
        PipelineError::Schema(format!("required column '{name}' is absent"))
    }
}
