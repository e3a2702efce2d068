//! Minimal in-memory typed table with the handful of queries the pipeline needs

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Datelike, Months, NaiveDate};

use crate::error::PipelineError;

/// Typed storage for a single column. Missing values are `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

/// Hashable view of one cell, used for exact-duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CellKey<'a> {
    Null,
    Text(&'a str),
    Number(u64),
    Date(NaiveDate),
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::Text(values))
    }

    pub fn number(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Number(values))
    }

    pub fn date(name: impl Into<String>, values: Vec<Option<NaiveDate>>) -> Self {
        Self::new(name, ColumnData::Date(values))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Text(v) => v.len(),
            ColumnData::Number(v) => v.len(),
            ColumnData::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self, row: usize) -> bool {
        match &self.data {
            ColumnData::Text(v) => v[row].is_none(),
            ColumnData::Number(v) => v[row].is_none(),
            ColumnData::Date(v) => v[row].is_none(),
        }
    }

    pub fn null_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_null(i)).count()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.data, ColumnData::Number(_))
    }

    pub fn as_text(&self) -> Option<&[Option<String>]> {
        match &self.data {
            ColumnData::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_numbers(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Number(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dates(&self) -> Option<&[Option<NaiveDate>]> {
        match &self.data {
            ColumnData::Date(v) => Some(v),
            _ => None,
        }
    }

    /// Cell rendered as a label; dates use ISO format, numbers their shortest form.
    pub fn label(&self, row: usize) -> Option<String> {
        match &self.data {
            ColumnData::Text(v) => v[row].clone(),
            ColumnData::Number(v) => v[row].map(|n| n.to_string()),
            ColumnData::Date(v) => v[row].map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }

    fn key(&self, row: usize) -> CellKey<'_> {
        match &self.data {
            ColumnData::Text(v) => v[row].as_deref().map_or(CellKey::Null, CellKey::Text),
            // -0.0 and 0.0 compare equal, so they must hash equal too
            ColumnData::Number(v) => v[row].map_or(CellKey::Null, |n| {
                CellKey::Number(if n == 0.0 { 0 } else { n.to_bits() })
            }),
            ColumnData::Date(v) => v[row].map_or(CellKey::Null, CellKey::Date),
        }
    }

    fn take(&self, rows: &[usize]) -> Column {
        let data = match &self.data {
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&i| v[i].clone()).collect()),
            ColumnData::Number(v) => ColumnData::Number(rows.iter().map(|&i| v[i]).collect()),
            ColumnData::Date(v) => ColumnData::Date(rows.iter().map(|&i| v[i]).collect()),
        };
        Column::new(self.name.clone(), data)
    }
}

/// Ordered collection of equally sized columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table, rejecting columns of mismatched length.
    pub fn from_columns(columns: Vec<Column>) -> crate::Result<Self> {
        let mut table = Table::new();
        for column in columns {
            table.set_column(column)?;
        }
        Ok(table)
    }

    pub fn height(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Table::column`] but a missing column is a schema error.
    pub fn require(&self, name: &str) -> crate::Result<&Column> {
        self.column(name)
            .ok_or_else(|| PipelineError::missing_column(name))
    }

    pub fn numbers(&self, name: &str) -> crate::Result<&[Option<f64>]> {
        self.require(name)?
            .as_numbers()
            .ok_or_else(|| PipelineError::Schema(format!("column '{name}' is not numeric")))
    }

    /// Replace the column of the same name in place, or append it.
    pub fn set_column(&mut self, column: Column) -> crate::Result<()> {
        if !self.columns.is_empty() && column.len() != self.height() {
            return Err(PipelineError::Schema(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.height()
            )));
        }
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.is_numeric()).collect()
    }

    /// Keep the rows whose mask entry is `true`, in order.
    pub fn filter(&self, mask: &[bool]) -> Table {
        let rows: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.take_rows(&rows)
    }

    pub fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
        }
    }

    /// Drop rows equal to an earlier row across every column. Nulls compare equal.
    pub fn distinct(&self) -> Table {
        let mut seen = HashSet::with_capacity(self.height());
        let mask: Vec<bool> = (0..self.height())
            .map(|row| {
                let key: Vec<CellKey<'_>> = self.columns.iter().map(|c| c.key(row)).collect();
                seen.insert(key)
            })
            .collect();
        self.filter(&mask)
    }

    /// Sum `value` per distinct `key` label. Groups come back in lexicographic
    /// label order; rows with a null key or value are skipped.
    pub fn group_sum(&self, key: &str, value: &str) -> crate::Result<Vec<(String, f64)>> {
        let keys = self.require(key)?;
        let values = self.numbers(value)?;

        let mut groups: BTreeMap<String, f64> = BTreeMap::new();
        for (row, v) in values.iter().enumerate() {
            if let (Some(label), Some(v)) = (keys.label(row), v) {
                *groups.entry(label).or_insert(0.0) += v;
            }
        }
        Ok(groups.into_iter().collect())
    }

    /// Collect `value` per distinct `key` label in first-seen order.
    pub fn group_values(&self, key: &str, value: &str) -> crate::Result<Vec<(String, Vec<f64>)>> {
        let keys = self.require(key)?;
        let values = self.numbers(value)?;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for (row, v) in values.iter().enumerate() {
            let (Some(label), Some(v)) = (keys.label(row), v) else {
                continue;
            };
            let slot = *index.entry(label.clone()).or_insert_with(|| {
                groups.push((label, Vec::new()));
                groups.len() - 1
            });
            groups[slot].1.push(*v);
        }
        Ok(groups)
    }

    /// Sum `value` per calendar month of `date`, keyed by the first day of the
    /// month. Every month between the earliest and latest is present; months
    /// without rows sum to zero.
    pub fn resample_monthly(&self, date: &str, value: &str) -> crate::Result<Vec<(NaiveDate, f64)>> {
        let dates = self
            .require(date)?
            .as_dates()
            .ok_or_else(|| PipelineError::Schema(format!("column '{date}' is not a date column")))?;
        let values = self.numbers(value)?;

        let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for (d, v) in dates.iter().zip(values) {
            if let (Some(d), Some(v)) = (d, v) {
                *buckets.entry(month_start(*d)).or_insert(0.0) += v;
            }
        }

        let (Some(&first), Some(&last)) = (buckets.keys().next(), buckets.keys().next_back()) else {
            return Ok(Vec::new());
        };

        let mut series = Vec::new();
        let mut month = first;
        while month <= last {
            series.push((month, buckets.get(&month).copied().unwrap_or(0.0)));
            month = match month.checked_add_months(Months::new(1)) {
                Some(next) => next,
                None => break,
            };
        }
        Ok(series)
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Stable descending sort by aggregate; equal sums keep their incoming order.
pub fn sort_descending(groups: &mut [(String, f64)]) {
    groups.sort_by(|a, b| b.1.total_cmp(&a.1));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Table {
        Table::from_columns(vec![
            Column::date(
                "Date",
                vec![Some(day(2024, 1, 5)), Some(day(2024, 1, 20)), Some(day(2024, 3, 2)), None],
            ),
            Column::text(
                "Product",
                vec![
                    Some("Widget".into()),
                    Some("Gadget".into()),
                    Some("Widget".into()),
                    Some("Gizmo".into()),
                ],
            ),
            Column::number("Total_Sales", vec![Some(100.0), Some(50.0), Some(25.0), Some(10.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_rejects_ragged_lengths() {
        let result = Table::from_columns(vec![
            Column::number("a", vec![Some(1.0), Some(2.0)]),
            Column::number("b", vec![Some(1.0)]),
        ]);
        assert!(matches!(result, Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_set_column_replaces_in_place() {
        let mut table = sample();
        table
            .set_column(Column::number("Product", vec![None; 4]))
            .unwrap();
        assert_eq!(table.column_names(), vec!["Date", "Product", "Total_Sales"]);
        assert!(table.column("Product").unwrap().is_numeric());
    }

    #[test]
    fn test_filter_preserves_order() {
        let table = sample().filter(&[false, true, true, false]);
        assert_eq!(table.height(), 2);
        let products = table.column("Product").unwrap().as_text().unwrap();
        assert_eq!(products, &[Some("Gadget".to_string()), Some("Widget".to_string())]);
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let table = Table::from_columns(vec![
            Column::text("k", vec![Some("a".into()), Some("b".into()), Some("a".into()), None, None]),
            Column::number("v", vec![Some(1.0), Some(2.0), Some(1.0), Some(-0.0), Some(0.0)]),
        ])
        .unwrap();

        let distinct = table.distinct();
        assert_eq!(distinct.height(), 3);
        assert_eq!(
            distinct.column("v").unwrap().as_numbers().unwrap(),
            &[Some(1.0), Some(2.0), Some(-0.0)]
        );
    }

    #[test]
    fn test_group_sum_is_lexicographic() {
        let groups = sample().group_sum("Product", "Total_Sales").unwrap();
        assert_eq!(
            groups,
            vec![
                ("Gadget".to_string(), 50.0),
                ("Gizmo".to_string(), 10.0),
                ("Widget".to_string(), 125.0),
            ]
        );
    }

    #[test]
    fn test_group_values_first_seen_order() {
        let groups = sample().group_values("Product", "Total_Sales").unwrap();
        let labels: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(labels, vec!["Widget", "Gadget", "Gizmo"]);
        assert_eq!(groups[0].1, vec![100.0, 25.0]);
    }

    #[test]
    fn test_group_sum_missing_column() {
        let err = sample().group_sum("Region", "Total_Sales").unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }

    #[test]
    fn test_resample_monthly_fills_gaps() {
        let series = sample().resample_monthly("Date", "Total_Sales").unwrap();
        assert_eq!(
            series,
            vec![
                (day(2024, 1, 1), 150.0),
                (day(2024, 2, 1), 0.0),
                (day(2024, 3, 1), 25.0),
            ]
        );
    }

    #[test]
    fn test_sort_descending_is_stable() {
        let mut groups = vec![
            ("a".to_string(), 5.0),
            ("b".to_string(), 9.0),
            ("c".to_string(), 5.0),
        ];
        sort_descending(&mut groups);
        let labels: Vec<&str> = groups.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(labels, vec!["b", "a", "c"]);
    }
}
