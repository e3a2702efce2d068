//! Summary statistics and correlation over the cleaned dataset

use crate::data::{PRODUCT, REGION, TOTAL_SALES};
use crate::error::PipelineError;
use crate::table::{sort_descending, Table};

/// Fixed-shape summary of a cleaned dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStats {
    pub rows: usize,
    pub columns: usize,
    /// Sum of `Total_Sales`
    pub total_revenue: f64,
    pub mean_order_value: f64,
    pub median_order_value: f64,
    /// Sample standard deviation; `None` with fewer than two rows
    pub std_order_value: Option<f64>,
    pub top_product: String,
    pub top_region: String,
}

/// Pairwise Pearson correlation between the numeric columns of a table.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: Vec<String>,
    /// Row-major, `labels.len()` squared; `None` where the coefficient is undefined
    pub values: Vec<Option<f64>>,
}

impl CorrelationMatrix {
    pub fn size(&self) -> usize {
        self.labels.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values[row * self.size() + col]
    }
}

/// Compute summary statistics for a cleaned dataset.
///
/// Fails with a schema error when the dataset is empty or lacks the
/// `Total_Sales`, `Product` or `Region` columns.
pub fn summarize(table: &Table) -> crate::Result<SummaryStats> {
    let sales: Vec<f64> = table.numbers(TOTAL_SALES)?.iter().flatten().copied().collect();
    if table.is_empty() || sales.is_empty() {
        return Err(PipelineError::Schema(
            "dataset is empty after cleaning; nothing to summarize".to_string(),
        ));
    }

    let total_revenue: f64 = sales.iter().sum();
    Ok(SummaryStats {
        rows: table.height(),
        columns: table.width(),
        total_revenue,
        mean_order_value: total_revenue / sales.len() as f64,
        median_order_value: median(&sales).unwrap_or(f64::NAN),
        std_order_value: sample_std(&sales),
        top_product: top_group(table, PRODUCT)?,
        top_region: top_group(table, REGION)?,
    })
}

/// Label with the highest summed `Total_Sales`. Ties go to the
/// lexicographically smallest label.
pub fn top_group(table: &Table, key: &str) -> crate::Result<String> {
    let mut groups = table.group_sum(key, TOTAL_SALES)?;
    sort_descending(&mut groups);
    groups
        .into_iter()
        .next()
        .map(|(label, _)| label)
        .ok_or_else(|| PipelineError::Schema(format!("no '{key}' groups to rank")))
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Standard deviation with the n-1 denominator.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}

/// Pearson correlation over the rows where both inputs are present.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| x.zip(*y))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

/// Correlation matrix across every numeric column, in table column order.
pub fn correlation_matrix(table: &Table) -> crate::Result<CorrelationMatrix> {
    let numeric = table.numeric_columns();
    if numeric.is_empty() {
        return Err(PipelineError::Schema("no numeric columns to correlate".to_string()));
    }

    let series: Vec<&[Option<f64>]> = numeric.iter().filter_map(|c| c.as_numbers()).collect();
    let mut values = Vec::with_capacity(series.len() * series.len());
    for xs in &series {
        for ys in &series {
            values.push(pearson(xs, ys));
        }
    }

    Ok(CorrelationMatrix {
        labels: numeric.iter().map(|c| c.name().to_string()).collect(),
        values,
    })
}
