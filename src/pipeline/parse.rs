//! Parsing: model response text → validated statement [`Table`].
//!
//! The model is asked for a bare CSV starting with the schema header. Well
//! prompted models still sometimes wrap the answer in ```` ```csv ```` fences,
//! use CRLF line endings, or open with a sentence of chatter. Those quirks
//! are cleaned up deterministically here; anything else that does not fit the
//! five-column schema is an [`ConvertError::ExtractionParse`], never a silent
//! partial table.

use crate::error::ConvertError;
use crate::table::{ExtractedRow, Table, STATEMENT_COLUMNS};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Parse the model's answer into a table with the statement header.
///
/// Rules, in order:
/// 1. Strip outer Markdown fences (` ```csv ` / ` ``` `)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Skip leading lines until one matches the schema header
/// 4. Stop at the first closing fence line; anything after it is a note
/// 5. Parse the rest as CSV; each record must have exactly five fields
///    (trailing empty extras are dropped)
pub fn parse_statement_csv(response: &str) -> Result<Table, ConvertError> {
    let text = strip_code_fences(response);
    let text = normalise_line_endings(&text);
    let text = text.trim();
    if text.is_empty() {
        return Err(ConvertError::ExtractionParse {
            detail: "model returned an empty response".into(),
        });
    }

    let body = locate_header(text).ok_or_else(|| ConvertError::ExtractionParse {
        detail: format!(
            "expected header '{}' not found in model response",
            STATEMENT_COLUMNS.join(",")
        ),
    })?;
    let body = cut_at_fence(body);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ConvertError::ExtractionParse {
            detail: format!("malformed CSV at data record {}: {e}", i + 1),
        })?;
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        if fields.iter().all(String::is_empty) {
            continue;
        }
        rows.push(to_row(fields, i + 1)?);
    }

    debug!("Parsed {} statement rows from model response", rows.len());
    Ok(Table::from_statement_rows(rows))
}

/// `record` is the 1-based CSV record number after the header.
fn to_row(mut fields: Vec<String>, record: usize) -> Result<ExtractedRow, ConvertError> {
    let width = STATEMENT_COLUMNS.len();
    if fields.len() > width && fields[width..].iter().all(String::is_empty) {
        warn!("Data record {record}: dropping {} trailing empty fields", fields.len() - width);
        fields.truncate(width);
    }
    let got = fields.len();
    let fields: [String; 5] = fields
        .try_into()
        .map_err(|_| ConvertError::ExtractionParse {
            detail: format!("data record {record} has {got} fields, expected {width}"),
        })?;
    Ok(ExtractedRow::from_fields(fields))
}

/// Return the text after the header line, or `None` if no line matches.
fn locate_header(text: &str) -> Option<&str> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if is_header_line(line) {
            return Some(&text[offset + line.len()..]);
        }
        offset += line.len();
    }
    None
}

/// Truncate `body` at the first line that opens or closes a code fence.
fn cut_at_fence(body: &str) -> &str {
    let mut offset = 0;
    for line in body.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            return &body[..offset];
        }
        offset += line.len();
    }
    body
}

/// Header match: same five names in order, trimmed, quotes and case ignored.
fn is_header_line(line: &str) -> bool {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    let Some(Ok(record)) = reader.records().next() else {
        return false;
    };
    record.len() == STATEMENT_COLUMNS.len()
        && record
            .iter()
            .zip(STATEMENT_COLUMNS)
            .all(|(got, want)| got.eq_ignore_ascii_case(want))
}

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\r?\n(.*?)\r?\n?```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}
