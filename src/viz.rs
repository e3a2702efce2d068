//! Chart rendering with Plotters
//!
//! Every chart is a variant of [`Chart`] and shares one contract: take the
//! cleaned dataset, write a fixed-named PNG into the output directory and
//! return its path.

use std::fs;
use std::path::{Path, PathBuf};

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::{info, warn};

use crate::data::{DATE, PRICE, PRODUCT, REGION, TOTAL_SALES};
use crate::error::PipelineError;
use crate::stats::correlation_matrix;
use crate::table::{sort_descending, Table};

/// Qualitative palette for bars, boxes and lines
const PALETTE: [RGBColor; 8] = [
    RGBColor(102, 194, 165),
    RGBColor(252, 141, 98),
    RGBColor(141, 160, 203),
    RGBColor(231, 138, 195),
    RGBColor(166, 216, 84),
    RGBColor(255, 217, 47),
    RGBColor(229, 196, 148),
    RGBColor(179, 179, 179),
];

const NEGATIVE: RGBColor = RGBColor(33, 102, 172);
const POSITIVE: RGBColor = RGBColor(178, 24, 43);
const UNDEFINED: RGBColor = RGBColor(220, 220, 220);

/// Where and how charts are written.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub output_dir: PathBuf,
    /// Prefix for currency tick labels
    pub currency_symbol: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("visualizations"),
            currency_symbol: "₹".to_string(),
        }
    }
}

/// The fixed set of charts produced on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chart {
    SalesByProduct,
    MonthlySalesTrend,
    SalesByRegion,
    PriceDistribution,
    CorrelationHeatmap,
}

impl Chart {
    pub const ALL: [Chart; 5] = [
        Chart::SalesByProduct,
        Chart::MonthlySalesTrend,
        Chart::SalesByRegion,
        Chart::PriceDistribution,
        Chart::CorrelationHeatmap,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Chart::SalesByProduct => "sales_by_product",
            Chart::MonthlySalesTrend => "monthly_sales_trend",
            Chart::SalesByRegion => "sales_by_region",
            Chart::PriceDistribution => "price_distribution_boxplot",
            Chart::CorrelationHeatmap => "correlation_heatmap",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.png", self.name())
    }

    fn title(&self) -> &'static str {
        match self {
            Chart::SalesByProduct => "Total Sales by Product",
            Chart::MonthlySalesTrend => "Monthly Sales Trend",
            Chart::SalesByRegion => "Total Sales by Region",
            Chart::PriceDistribution => "Price Distribution by Product",
            Chart::CorrelationHeatmap => "Correlation Matrix (numeric features)",
        }
    }

    /// Render this chart into `options.output_dir`, overwriting any previous file.
    ///
    /// The output directory must already exist; [`render_all`] creates it.
    pub fn render(&self, table: &Table, options: &RenderOptions) -> crate::Result<PathBuf> {
        let path = options.output_dir.join(self.file_name());
        let drawn = match self {
            Chart::SalesByProduct => draw_sales_by_product(table, &path, options),
            Chart::MonthlySalesTrend => draw_monthly_trend(table, &path, options),
            Chart::SalesByRegion => draw_sales_by_region(table, &path, options),
            Chart::PriceDistribution => draw_price_distribution(table, &path, options),
            Chart::CorrelationHeatmap => draw_correlation_heatmap(table, &path),
        };
        drawn.map_err(|e| PipelineError::Render {
            chart: self.name(),
            reason: format!("{e:#}"),
        })?;

        info!(chart = self.name(), path = %path.display(), "chart written");
        Ok(path)
    }
}

/// Outcome of rendering the full chart set.
#[derive(Debug, Default)]
pub struct RenderSummary {
    pub written: Vec<PathBuf>,
    pub failed: Vec<PipelineError>,
}

impl RenderSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Render every chart in [`Chart::ALL`].
///
/// Creates the output directory if needed. With `fail_fast` the first render
/// error is returned immediately; otherwise each failure is recorded and the
/// remaining charts are still attempted.
pub fn render_all(table: &Table, options: &RenderOptions, fail_fast: bool) -> crate::Result<RenderSummary> {
    fs::create_dir_all(&options.output_dir)?;

    let mut summary = RenderSummary::default();
    for chart in Chart::ALL {
        match chart.render(table, options) {
            Ok(path) => summary.written.push(path),
            Err(e) if fail_fast => return Err(e),
            Err(e) => {
                warn!(chart = chart.name(), error = %e, "chart skipped");
                summary.failed.push(e);
            }
        }
    }
    Ok(summary)
}

/// Format a value as whole currency units with thousands separators, e.g. `₹1,234`.
pub fn format_currency(value: f64, symbol: &str) -> String {
    let whole = value.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if whole < 0 { "-" } else { "" };
    format!("{symbol}{sign}{grouped}")
}

fn segment_label(value: &SegmentValue<usize>, labels: &[String]) -> String {
    match value {
        SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
        _ => String::new(),
    }
}

/// Upper axis bound with headroom; never collapses to an empty range.
fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
    let max = values.fold(0.0_f64, f64::max);
    if max > 0.0 && max.is_finite() {
        max * 1.1
    } else {
        1.0
    }
}

fn draw_sales_by_product(table: &Table, path: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let mut groups = table.group_sum(PRODUCT, TOTAL_SALES)?;
    sort_descending(&mut groups);
    if groups.is_empty() {
        anyhow::bail!("no {PRODUCT} groups to plot");
    }

    // Largest bar on top: segment 0 sits at the bottom of the axis
    let n = groups.len();
    let labels: Vec<String> = groups.iter().rev().map(|(label, _)| label.clone()).collect();
    let x_max = axis_max(groups.iter().map(|(_, total)| *total));

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(Chart::SalesByProduct.title(), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..x_max, (0..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .x_desc("Total Sales")
        .x_label_formatter(&|v| format_currency(*v, &options.currency_symbol))
        .y_label_formatter(&|v| segment_label(v, &labels))
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(groups.iter().enumerate().map(|(i, (_, total))| {
        let slot = n - 1 - i;
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(slot)), (*total, SegmentValue::Exact(slot + 1))],
            PALETTE[i % PALETTE.len()].filled(),
        );
        bar.set_margin(6, 6, 0, 0);
        bar
    }))?;

    root.present()?;
    Ok(())
}

fn draw_monthly_trend(table: &Table, path: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let monthly = table.resample_monthly(DATE, TOTAL_SALES)?;
    if monthly.is_empty() {
        anyhow::bail!("no dated sales to plot");
    }

    let n = monthly.len();
    let labels: Vec<String> = monthly.iter().map(|(m, _)| m.format("%Y-%m").to_string()).collect();
    let y_max = axis_max(monthly.iter().map(|(_, total)| *total));
    let points: Vec<(SegmentValue<usize>, f64)> = monthly
        .iter()
        .enumerate()
        .map(|(i, (_, total))| (SegmentValue::CenterOf(i), *total))
        .collect();

    let root = BitMapBackend::new(path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(Chart::MonthlySalesTrend.title(), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d((0..n).into_segmented(), 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_labels(n)
        .x_desc("Month")
        .y_desc("Total Sales")
        .x_label_formatter(&|v| segment_label(v, &labels))
        .y_label_formatter(&|v| format_currency(*v, &options.currency_symbol))
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let color = PALETTE[0];
    chart.draw_series(LineSeries::new(points.iter().cloned(), color.stroke_width(2)))?;
    chart.draw_series(points.iter().map(|p| Circle::new(p.clone(), 5, color.filled())))?;

    root.present()?;
    Ok(())
}

fn draw_sales_by_region(table: &Table, path: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let mut groups = table.group_sum(REGION, TOTAL_SALES)?;
    sort_descending(&mut groups);
    if groups.is_empty() {
        anyhow::bail!("no {REGION} groups to plot");
    }

    let n = groups.len();
    let labels: Vec<String> = groups.iter().map(|(label, _)| label.clone()).collect();
    let y_max = axis_max(groups.iter().map(|(_, total)| *total));

    let root = BitMapBackend::new(path, (800, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(Chart::SalesByRegion.title(), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d((0..n).into_segmented(), 0f64..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .y_desc("Total Sales")
        .x_label_formatter(&|v| segment_label(v, &labels))
        .y_label_formatter(&|v| format_currency(*v, &options.currency_symbol))
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(groups.iter().enumerate().map(|(i, (_, total))| {
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *total)],
            PALETTE[i % PALETTE.len()].filled(),
        );
        bar.set_margin(0, 0, 12, 12);
        bar
    }))?;

    root.present()?;
    Ok(())
}

fn draw_price_distribution(table: &Table, path: &Path, options: &RenderOptions) -> anyhow::Result<()> {
    let groups = table.group_values(PRODUCT, PRICE)?;
    if groups.is_empty() {
        anyhow::bail!("no {PRICE} values to plot");
    }

    let n = groups.len();
    let labels: Vec<String> = groups.iter().map(|(label, _)| label.clone()).collect();
    let all = groups.iter().flat_map(|(_, prices)| prices.iter().copied());
    let (lo, hi) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let pad = ((hi - lo) * 0.1).max(1.0);
    let y_range = ((lo - pad).max(0.0) as f32)..((hi + pad) as f32);

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(Chart::PriceDistribution.title(), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d((0..n).into_segmented(), y_range)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_desc("Product")
        .y_desc("Price")
        .x_label_formatter(&|v| segment_label(v, &labels))
        .y_label_formatter(&|v| format_currency(f64::from(*v), &options.currency_symbol))
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(groups.iter().enumerate().map(|(i, (_, prices))| {
        let quartiles = Quartiles::new(prices);
        Boxplot::new_vertical(SegmentValue::CenterOf(i), &quartiles)
            .width(30)
            .whisker_width(0.5)
            .style(PALETTE[i % PALETTE.len()].stroke_width(2))
    }))?;

    root.present()?;
    Ok(())
}

fn draw_correlation_heatmap(table: &Table, path: &Path) -> anyhow::Result<()> {
    let matrix = correlation_matrix(table)?;
    let n = matrix.size();
    let x_labels = matrix.labels.clone();
    // First variable on the top row
    let y_labels: Vec<String> = matrix.labels.iter().rev().cloned().collect();

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(Chart::CorrelationHeatmap.title(), ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(110)
        .build_cartesian_2d((0..n).into_segmented(), (0..n).into_segmented())?;

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n)
        .y_labels(n)
        .x_label_formatter(&|v| segment_label(v, &x_labels))
        .y_label_formatter(&|v| segment_label(v, &y_labels))
        .draw()?;

    let cells: Vec<(usize, usize, Option<f64>)> = (0..n)
        .flat_map(|row| (0..n).map(move |col| (row, col)))
        .map(|(row, col)| (row, col, matrix.get(row, col)))
        .collect();

    chart.draw_series(cells.iter().map(|&(row, col, value)| {
        let y = n - 1 - row;
        Rectangle::new(
            [(SegmentValue::Exact(col), SegmentValue::Exact(y)), (SegmentValue::Exact(col + 1), SegmentValue::Exact(y + 1))],
            heat_color(value).filled(),
        )
    }))?;

    let annotation = TextStyle::from(("sans-serif", 18).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
    chart.draw_series(cells.iter().map(|&(row, col, value)| {
        let text = value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"));
        Text::new(
            text,
            (SegmentValue::CenterOf(col), SegmentValue::CenterOf(n - 1 - row)),
            annotation.clone(),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Diverging blue-white-red scale centred on zero.
fn heat_color(value: Option<f64>) -> RGBColor {
    let Some(v) = value else {
        return UNDEFINED;
    };
    let v = v.clamp(-1.0, 1.0);
    let target = if v < 0.0 { NEGATIVE } else { POSITIVE };
    let t = v.abs();
    let mix = |c: u8| (255.0 + (f64::from(c) - 255.0) * t).round() as u8;
    RGBColor(mix(target.0), mix(target.1), mix(target.2))
}
