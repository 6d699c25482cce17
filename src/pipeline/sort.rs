//! Row ordering by transaction date.
//!
//! Rows are split into two groups: those whose `Date` cell parses, and those
//! whose does not. Parsed rows are stably sorted ascending; unparsed rows
//! follow in their original relative order. A plain comparator that answers
//! "not less" for every unparseable pair is not a total order, so the
//! partition is explicit.
//!
//! The `Date` column is located by exact, case-sensitive match on the trimmed
//! header name. Without such a column the table is returned untouched.

use crate::table::Table;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::debug;

/// Header name of the column rows are ordered by.
pub const DATE_COLUMN: &str = "Date";

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%d %B %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a statement date in any of the accepted layouts.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(v) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(v, fmt) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(v, fmt).ok())
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// Order the table's rows by the `Date` column.
pub fn sort_by_date(mut table: Table) -> Table {
    let Some(idx) = table.column_index(DATE_COLUMN) else {
        debug!("No '{}' column; keeping original row order", DATE_COLUMN);
        return table;
    };

    let rows = table.take_rows();
    table.with_rows(partition_sort(rows, idx))
}

/// Stable partition: valid dates ascending, then invalid dates in input order.
pub fn partition_sort(rows: Vec<Vec<String>>, date_idx: usize) -> Vec<Vec<String>> {
    let mut valid: Vec<(NaiveDateTime, Vec<String>)> = Vec::with_capacity(rows.len());
    let mut invalid: Vec<Vec<String>> = Vec::new();

    for row in rows {
        match row.get(date_idx).and_then(|v| parse_date(v)) {
            Some(date) => valid.push((date, row)),
            None => invalid.push(row),
        }
    }
    debug!(
        "Sorting {} dated rows; {} rows with unparseable dates go last",
        valid.len(),
        invalid.len()
    );

    valid.sort_by_key(|(date, _)| *date);
    valid
        .into_iter()
        .map(|(_, row)| row)
        .chain(invalid)
        .collect()
}
