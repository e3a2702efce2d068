//! Plain-text run report

use std::io::{self, Write};

use crate::stats::SummaryStats;
use crate::viz::{format_currency, RenderSummary};

/// Write summary statistics and chart outcomes as plain text.
pub fn write_report<W: Write>(
    out: &mut W,
    stats: &SummaryStats,
    charts: &RenderSummary,
    currency: &str,
) -> io::Result<()> {
    writeln!(out, "=== Summary ===")?;
    writeln!(out, "Rows: {} | Columns: {}", stats.rows, stats.columns)?;
    writeln!(out, "Total Revenue: {}", format_currency(stats.total_revenue, currency))?;
    writeln!(out, "Average Order Value: {currency}{:.2}", stats.mean_order_value)?;
    writeln!(out, "Median Order Value: {currency}{:.2}", stats.median_order_value)?;
    match stats.std_order_value {
        Some(std) => writeln!(out, "Std Dev (Order Value): {currency}{std:.2}")?,
        None => writeln!(out, "Std Dev (Order Value): n/a")?,
    }
    writeln!(out, "Top Product by Revenue: {}", stats.top_product)?;
    writeln!(out, "Top Region by Revenue: {}", stats.top_region)?;

    writeln!(out, "\nSaved visualizations:")?;
    for path in &charts.written {
        writeln!(out, " - {}", path.display())?;
    }

    if !charts.failed.is_empty() {
        writeln!(out, "\nFailed visualizations:")?;
        for err in &charts.failed {
            writeln!(out, " - {err}")?;
        }
    }
    Ok(())
}

/// Render the report into a string.
pub fn format_report(stats: &SummaryStats, charts: &RenderSummary, currency: &str) -> io::Result<String> {
    let mut buf = Vec::new();
    write_report(&mut buf, stats, charts, currency)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Print the report to standard output.
pub fn print_report(stats: &SummaryStats, charts: &RenderSummary, currency: &str) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_report(&mut handle, stats, charts, currency)?;
    handle.flush()
}
