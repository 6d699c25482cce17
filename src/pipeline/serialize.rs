//! Serialization: [`Table`] → CSV text or an XLSX workbook on disk.
//!
//! CSV fields are quoted only when they contain a comma, a double quote, or
//! a line break; embedded quotes are doubled. Records end with `\n`, the
//! last one included.
//!
//! Writes go to a temp file in the destination directory that is renamed
//! into place once complete, so a failed write never leaves a truncated
//! artifact under the final name.

use crate::error::ConvertError;
use crate::output::OutputFormat;
use crate::table::Table;
use rust_xlsxwriter::Workbook;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// Render the table (header first) as CSV text.
pub fn to_csv_string(table: &Table) -> Result<String, ConvertError> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for row in table.iter_all() {
        writer.write_record(row).map_err(|e| ConvertError::Serialization {
            detail: format!("CSV encoding failed: {e}"),
        })?;
    }

    let bytes = writer.into_inner().map_err(|e| ConvertError::Serialization {
        detail: format!("CSV flush failed: {e}"),
    })?;
    String::from_utf8(bytes).map_err(|e| ConvertError::Serialization {
        detail: format!("CSV is not valid UTF-8: {e}"),
    })
}

/// Build a single-sheet XLSX workbook in memory.
pub fn to_xlsx_bytes(table: &Table, sheet_name: &str) -> Result<Vec<u8>, ConvertError> {
    let xlsx_err = |e: rust_xlsxwriter::XlsxError| ConvertError::Serialization {
        detail: format!("XLSX encoding failed: {e}"),
    };

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name).map_err(xlsx_err)?;

    for (r, row) in table.iter_all().enumerate() {
        let r = u32::try_from(r).map_err(|_| ConvertError::Serialization {
            detail: "too many rows for one worksheet".into(),
        })?;
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let c = u16::try_from(c).map_err(|_| ConvertError::Serialization {
                detail: "too many columns for one worksheet".into(),
            })?;
            worksheet.write_string(r, c, value).map_err(xlsx_err)?;
        }
    }

    workbook.save_to_buffer().map_err(xlsx_err)
}

/// Serialize `table` in `format` and write it atomically to `path`.
pub async fn write_table(
    table: &Table,
    format: OutputFormat,
    sheet_name: &str,
    path: &Path,
) -> Result<(), ConvertError> {
    let bytes = match format {
        OutputFormat::Csv => to_csv_string(table)?.into_bytes(),
        OutputFormat::Xlsx => to_xlsx_bytes(table, sheet_name)?,
    };
    debug!("Encoded {} rows as {:?}: {} bytes", table.len(), format, bytes.len());

    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
        .await
        .map_err(|e| ConvertError::Unexpected(format!("Write task panicked: {e}")))??;
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ConvertError> {
    let write_err = |e: std::io::Error| ConvertError::Serialization {
        detail: format!("cannot write '{}': {e}", path.display()),
    };
    let dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
