//! Sales CSV loading and the cleaning/normalization pipeline

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::table::{Column, ColumnData, Table};

pub const DATE: &str = "Date";
pub const PRODUCT: &str = "Product";
pub const REGION: &str = "Region";
pub const QUANTITY: &str = "Quantity";
pub const PRICE: &str = "Price";
pub const TOTAL_SALES: &str = "Total_Sales";

/// Columns whose null value disqualifies a row.
pub const CRITICAL_COLUMNS: [&str; 6] = [DATE, PRODUCT, REGION, QUANTITY, PRICE, TOTAL_SALES];

/// Columns coerced to numbers during cleaning.
const NUMERIC_COLUMNS: [&str; 3] = [QUANTITY, PRICE, TOTAL_SALES];

/// Cell spellings read as missing values.
const NULL_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const DATE_FORMATS: [&str; 6] = ["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y", "%Y%m%d", "%d.%m.%Y"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Load a sales CSV and run it through [`clean`].
///
/// # Arguments
/// * `path` - Path to the delimited input file
///
/// # Returns
/// * The cleaned dataset, or a `Load` error if the file cannot be read as a table
pub fn load_and_clean(path: impl AsRef<Path>) -> crate::Result<Table> {
    let raw = load_raw(path)?;
    clean(raw)
}

/// Read a CSV into a table without applying any cleaning.
///
/// Header labels are trimmed. Columns whose non-null cells all parse as numbers
/// are typed numeric, everything else is kept as text.
pub fn load_raw(path: impl AsRef<Path>) -> crate::Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| PipelineError::load(path, e))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::load(path, format!("failed to read header row: {e}")))?;
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(PipelineError::load(path, "no columns to parse"));
    }
    let headers = dedupe_headers(headers.iter().map(|h| h.trim().to_string()).collect());

    let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (idx, record) in reader.records().enumerate() {
        // records start on line 2, after the header
        let line = idx + 2;
        let record = record.map_err(|e| PipelineError::load(path, format!("line {line}: {e}")))?;
        if record.len() > headers.len() {
            debug!(
                line,
                fields = record.len(),
                columns = headers.len(),
                "row has more fields than the header; extra fields ignored"
            );
        }
        for (col, values) in cells.iter_mut().enumerate() {
            values.push(record.get(col).and_then(non_null));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| infer_column(name, values))
        .collect();
    let table = Table::from_columns(columns)?;

    info!(
        path = %path.display(),
        rows = table.height(),
        columns = table.width(),
        "loaded input file"
    );
    Ok(table)
}

/// Normalize a loaded table.
///
/// Coerces `Date` to calendar dates and `Quantity`/`Price`/`Total_Sales` to
/// numbers (unparseable cells become null), derives `Total_Sales` as
/// `Quantity * Price` for every row when the column is missing or holds any
/// null, drops rows with a null critical field, then removes exact duplicates.
/// Running it on its own output changes nothing.
pub fn clean(mut table: Table) -> crate::Result<Table> {
    let rows_in = table.height();

    coerce_dates(&mut table)?;
    for name in NUMERIC_COLUMNS {
        coerce_numeric(&mut table, name)?;
    }

    if derive_total_sales(&mut table)? {
        debug!("recomputed {TOTAL_SALES} from {QUANTITY} and {PRICE}");
    }

    let complete = drop_incomplete_rows(&table);
    let rows_complete = complete.height();
    let cleaned = complete.distinct();

    info!(
        rows_in,
        dropped_incomplete = rows_in - rows_complete,
        dropped_duplicates = rows_complete - cleaned.height(),
        rows_out = cleaned.height(),
        "cleaned dataset"
    );
    Ok(cleaned)
}

fn non_null(cell: &str) -> Option<String> {
    if NULL_TOKENS.contains(&cell) {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Repeated header labels get a `.N` suffix so every column stays addressable.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let mut candidate = header.clone();
        let mut n = 1;
        while out.contains(&candidate) {
            candidate = format!("{header}.{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

fn infer_column(name: String, values: Vec<Option<String>>) -> Column {
    let numeric = values
        .iter()
        .flatten()
        .all(|v| parse_number(v).is_some());
    if numeric {
        let numbers = values.iter().map(|v| v.as_deref().and_then(parse_number)).collect();
        Column::number(name, numbers)
    } else {
        Column::text(name, values)
    }
}

pub(crate) fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parse a calendar date, accepting common date and date-time layouts.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn coerce_dates(table: &mut Table) -> crate::Result<()> {
    let Some(column) = table.column(DATE) else {
        return Ok(());
    };
    let dates: Vec<Option<NaiveDate>> = match column.data() {
        ColumnData::Date(_) => return Ok(()),
        ColumnData::Text(values) => values.iter().map(|v| v.as_deref().and_then(parse_date)).collect(),
        ColumnData::Number(values) => values
            .iter()
            .map(|v| v.and_then(|n| parse_date(&number_to_text(n))))
            .collect(),
    };

    let unparsed = dates.iter().filter(|d| d.is_none()).count() - column.null_count();
    if unparsed > 0 {
        debug!(unparsed, "{DATE} values could not be parsed and were set to null");
    }
    table.set_column(Column::date(DATE, dates))
}

fn coerce_numeric(table: &mut Table, name: &str) -> crate::Result<()> {
    let Some(column) = table.column(name) else {
        return Ok(());
    };
    let numbers: Vec<Option<f64>> = match column.data() {
        ColumnData::Number(_) => return Ok(()),
        ColumnData::Text(values) => values.iter().map(|v| v.as_deref().and_then(parse_number)).collect(),
        ColumnData::Date(values) => vec![None; values.len()],
    };
    let unparsed = numbers.iter().filter(|n| n.is_none()).count() - column.null_count();
    if unparsed > 0 {
        debug!(unparsed, column = name, "values could not be parsed as numbers and were set to null");
    }
    table.set_column(Column::number(name, numbers))
}

/// Whole-column policy: one null anywhere in `Total_Sales` (or no such column)
/// recomputes it for every row. Returns whether it was recomputed.
fn derive_total_sales(table: &mut Table) -> crate::Result<bool> {
    let needs_derivation = table
        .column(TOTAL_SALES)
        .map_or(true, |c| c.null_count() > 0);
    if !needs_derivation {
        return Ok(false);
    }

    let quantity = table.column(QUANTITY).and_then(Column::as_numbers);
    let price = table.column(PRICE).and_then(Column::as_numbers);
    let (Some(quantity), Some(price)) = (quantity, price) else {
        return Ok(false);
    };

    let totals: Vec<Option<f64>> = quantity
        .iter()
        .zip(price)
        // inf * 0 is NaN, which counts as missing
        .map(|(q, p)| q.zip(*p).map(|(q, p)| q * p).filter(|v| !v.is_nan()))
        .collect();
    table.set_column(Column::number(TOTAL_SALES, totals))?;
    Ok(true)
}

fn drop_incomplete_rows(table: &Table) -> Table {
    let present: Vec<&Column> = CRITICAL_COLUMNS
        .iter()
        .filter_map(|name| table.column(name))
        .collect();
    let mask: Vec<bool> = (0..table.height())
        .map(|row| present.iter().all(|c| !c.is_null(row)))
        .collect();
    table.filter(&mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_load_raw_trims_headers_and_infers_types() {
        let file = write_csv(&[
            " Date , Product,Region ,Quantity,Price,Discount",
            "2024-01-01,Widget,North,2,50,0.1",
            "2024-01-02,Gadget,South,1,20,NA",
        ]);

        let table = load_raw(file.path()).unwrap();
        assert_eq!(
            table.column_names(),
            vec!["Date", "Product", "Region", "Quantity", "Price", "Discount"]
        );
        assert!(table.column("Quantity").unwrap().is_numeric());
        assert_eq!(
            table.column("Discount").unwrap().as_numbers().unwrap(),
            &[Some(0.1), None]
        );
        assert!(table.column("Product").unwrap().as_text().is_some());
    }

    #[test]
    fn test_load_raw_missing_file() {
        let err = load_raw("definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
    }

    #[test]
    fn test_load_raw_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let err = load_raw(file.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Load { .. }));
    }

    #[test]
    fn test_dedupe_headers() {
        let headers = dedupe_headers(vec!["a".into(), "b".into(), "a".into(), "a".into()]);
        assert_eq!(headers, vec!["a", "b", "a.1", "a.2"]);
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-02-29"), Some(day(2024, 2, 29)));
        assert_eq!(parse_date("2024/03/01"), Some(day(2024, 3, 1)));
        assert_eq!(parse_date("03/15/2024"), Some(day(2024, 3, 15)));
        assert_eq!(parse_date("2024-01-05 13:45:00"), Some(day(2024, 1, 5)));
        assert_eq!(parse_date("2024-01-05T08:00:00Z"), Some(day(2024, 1, 5)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn test_clean_coerces_and_filters_bad_values() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales",
            "2024-01-01,Widget,North,2,50,100",
            "garbage,Widget,North,1,50,50",
            "2024-01-03,Gadget,South,lots,20,40",
            "2024-01-04,Gizmo,,1,10,10",
        ]);

        let cleaned = load_and_clean(file.path()).unwrap();
        assert_eq!(cleaned.height(), 1);
        assert_eq!(
            cleaned.column(DATE).unwrap().as_dates().unwrap(),
            &[Some(day(2024, 1, 1))]
        );
    }

    #[test]
    fn test_clean_derives_total_sales_when_absent() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price",
            "2024-01-01,Widget,North,3,12.5",
            "2024-01-02,Gadget,South,4,20",
        ]);

        let cleaned = load_and_clean(file.path()).unwrap();
        assert_eq!(cleaned.column_names().last(), Some(&TOTAL_SALES));
        let quantity = cleaned.numbers(QUANTITY).unwrap();
        let price = cleaned.numbers(PRICE).unwrap();
        let total = cleaned.numbers(TOTAL_SALES).unwrap();
        for row in 0..cleaned.height() {
            assert_eq!(total[row], Some(quantity[row].unwrap() * price[row].unwrap()));
        }
    }

    #[test]
    fn test_single_null_recomputes_whole_column() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales",
            "2024-01-01,Widget,North,2,50,999",
            "2024-01-02,Gadget,South,1,20,",
        ]);

        let cleaned = load_and_clean(file.path()).unwrap();
        assert_eq!(
            cleaned.numbers(TOTAL_SALES).unwrap(),
            &[Some(100.0), Some(20.0)]
        );
    }

    #[test]
    fn test_complete_total_sales_left_untouched() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales",
            "2024-01-01,Widget,North,2,50,95",
            "2024-01-02,Gadget,South,1,20,20",
        ]);

        let cleaned = load_and_clean(file.path()).unwrap();
        assert_eq!(
            cleaned.numbers(TOTAL_SALES).unwrap(),
            &[Some(95.0), Some(20.0)]
        );
    }

    #[test]
    fn test_derived_duplicates_collapse_to_one_row() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales",
            "2024-01-01,Widget,North,2,50,",
            "2024-01-01,Widget,North,2,50,",
        ]);

        let cleaned = load_and_clean(file.path()).unwrap();
        assert_eq!(cleaned.height(), 1);
        assert_eq!(cleaned.numbers(TOTAL_SALES).unwrap(), &[Some(100.0)]);
    }

    #[test]
    fn test_nan_derived_total_is_dropped() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales",
            "2024-01-01,Widget,North,inf,0,",
            "2024-01-02,Gadget,South,1,10,10",
        ]);

        let cleaned = load_and_clean(file.path()).unwrap();
        assert_eq!(cleaned.height(), 1);
        assert_eq!(cleaned.numbers(TOTAL_SALES).unwrap(), &[Some(10.0)]);
        assert_eq!(cleaned.column(PRODUCT).unwrap().label(0).as_deref(), Some("Gadget"));
    }

    #[test]
    fn test_null_tokens() {
        for token in ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"] {
            assert_eq!(non_null(token), None, "{token:?} should read as null");
        }
        assert_eq!(non_null("-"), Some("-".to_string()));
        assert_eq!(non_null("Widget"), Some("Widget".to_string()));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales",
            "2024-01-01,Widget,North,2,50,100,surplus",
            "2024-01-02,Gadget,South,1,10",
        ]);

        let table = load_raw(file.path()).unwrap();
        assert_eq!(table.width(), 6);
        assert_eq!(table.height(), 2);
        assert_eq!(
            table.column(TOTAL_SALES).unwrap().as_numbers().unwrap(),
            &[Some(100.0), None]
        );
    }

    #[test]
    fn test_rows_differing_only_by_date_are_kept() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales",
            "2024-01-01,Widget,North,2,50,",
            "2024-01-02,Widget,North,2,50,",
        ]);

        let cleaned = load_and_clean(file.path()).unwrap();
        assert_eq!(cleaned.height(), 2);
        assert_eq!(
            cleaned.numbers(TOTAL_SALES).unwrap(),
            &[Some(100.0), Some(100.0)]
        );
    }

    #[test]
    fn test_clean_is_idempotent() {
        let file = write_csv(&[
            "Date,Product,Region,Quantity,Price,Total_Sales,Note",
            "2024-01-01,Widget,North,2,50,,promo",
            "2024-01-01,Widget,North,2,50,,promo",
            "bad,Gadget,South,1,20,20,",
            "2024-02-11,Gadget,South,1,20,20,",
            "2024-02-12,Gizmo,East,5,7.5,,12",
        ]);

        let once = load_and_clean(file.path()).unwrap();
        let twice = clean(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_header_only_file_cleans_to_empty_table() {
        let file = write_csv(&["Date,Product,Region,Quantity,Price,Total_Sales"]);
        let cleaned = load_and_clean(file.path()).unwrap();
        assert!(cleaned.is_empty());
        assert_eq!(cleaned.width(), 6);
    }
}
