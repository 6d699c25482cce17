//! Spreadsheet reading and column normalisation.
//!
//! Only the first worksheet is read. Its first row supplies the column
//! names; every later row becomes a record projected onto those names, with
//! missing cells defaulting to the empty string. Values are stringified
//! without type coercion beyond what the cell already holds.
//!
//! calamine is synchronous and can spend real time inflating a large
//! workbook, so reading runs in `spawn_blocking`.
//!
//! The container format is detected from the bytes, not the extension: an
//! `.xls` export that is really XLSX opens like any other workbook.

use crate::error::ConvertError;
use crate::table::Table;
use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

/// Read the first sheet of the workbook at `path` into a [`Table`].
///
/// # Errors
/// - [`ConvertError::SpreadsheetRead`] when the workbook cannot be opened
/// - [`ConvertError::EmptyInput`] when the sheet has no data rows
pub async fn read_first_sheet(path: &Path) -> Result<Table, ConvertError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || read_first_sheet_blocking(&path))
        .await
        .map_err(|e| ConvertError::Unexpected(format!("Spreadsheet task panicked: {e}")))?
}

fn read_first_sheet_blocking(path: &Path) -> Result<Table, ConvertError> {
    let bytes = std::fs::read(path).map_err(|e| ConvertError::SpreadsheetRead {
        detail: format!("cannot read '{}': {e}", path.display()),
    })?;
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).map_err(|e| ConvertError::SpreadsheetRead {
            detail: e.to_string(),
        })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ConvertError::EmptyInput {
            detail: "workbook has no sheets".into(),
        })?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ConvertError::SpreadsheetRead {
            detail: format!("sheet '{sheet_name}': {e}"),
        })?;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();
    info!(
        "Read sheet '{}' from {}: {} rows including header",
        sheet_name,
        path.display(),
        rows.len()
    );

    normalize_rows(rows)
}

/// Turn raw sheet rows (header first) into a [`Table`].
///
/// Header cells are made unique: an empty name becomes `__EMPTY`,
/// `__EMPTY_1`, … and a repeated name `X` becomes `X_1`, `X_2`, …
/// Data rows that are entirely blank are skipped.
pub fn normalize_rows(rows: Vec<Vec<String>>) -> Result<Table, ConvertError> {
    let mut iter = rows.into_iter();
    let raw_header = iter.next().ok_or_else(|| ConvertError::EmptyInput {
        detail: "No data found in Excel sheet".into(),
    })?;

    let header = unique_header(&raw_header);
    let width = header.len();

    let records: Vec<Vec<String>> = iter
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .map(|row| project(row, width))
        .collect();

    if records.is_empty() {
        return Err(ConvertError::EmptyInput {
            detail: "No data found in Excel sheet".into(),
        });
    }
    debug!("Detected columns: {:?}", header);

    Table::new(header, records)
}

/// Project a row onto `width` columns: pad with empty strings, drop overflow.
fn project(mut row: Vec<String>, width: usize) -> Vec<String> {
    row.resize(width, String::new());
    row
}

fn unique_header(raw: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.iter()
        .map(|cell| {
            let base = if cell.trim().is_empty() {
                "__EMPTY".to_string()
            } else {
                cell.clone()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 {
                base
            } else {
                format!("{base}_{count}")
            };
            *count += 1;
            name
        })
        .collect()
}

/// Stringify one cell the way a reader would see it.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => e.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => dt.format("%Y-%m-%d").to_string(),
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
    }
}

/// Shortest round-trip form: `1.0` → `1`, `2.5` → `2.5`.
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
