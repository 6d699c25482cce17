//! In-memory tabular data passed between pipeline stages.
//!
//! A [`Table`] is a header plus rows of strings. Its one structural
//! invariant, that every row has exactly as many fields as the header, is
//! enforced at construction, so serializers never see ragged input.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};

/// Column names requested from the model for bank statements, in order.
pub const STATEMENT_COLUMNS: [&str; 5] = [
    "Date",
    "Transaction ID",
    "Sender/Receiver Name",
    "Debit",
    "Credit",
];

/// One transaction extracted from a statement.
///
/// Field order matches [`STATEMENT_COLUMNS`]. Every field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRow {
    /// Transaction date, ideally `YYYY-MM-DD`.
    pub date: String,
    pub transaction_id: String,
    /// Name of the other party.
    pub counterparty: String,
    /// Outgoing amount as text.
    pub debit: String,
    /// Incoming amount as text.
    pub credit: String,
}

impl ExtractedRow {
    /// Build a row from exactly five fields in schema order.
    pub fn from_fields(fields: [String; 5]) -> Self {
        let [date, transaction_id, counterparty, debit, credit] = fields;
        Self {
            date,
            transaction_id,
            counterparty,
            debit,
            credit,
        }
    }

    pub fn into_fields(self) -> Vec<String> {
        vec![
            self.date,
            self.transaction_id,
            self.counterparty,
            self.debit,
            self.credit,
        ]
    }
}

/// A header row plus data rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table, checking every row against the header width.
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, ConvertError> {
        if header.is_empty() {
            return Err(ConvertError::Unexpected("table header is empty".into()));
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != header.len())
        {
            return Err(ConvertError::Unexpected(format!(
                "row {} has {} fields, header has {}",
                i + 1,
                row.len(),
                header.len()
            )));
        }
        Ok(Self { header, rows })
    }

    /// Build a bank-statement table from extracted rows.
    pub fn from_statement_rows(rows: Vec<ExtractedRow>) -> Self {
        Self {
            header: STATEMENT_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: rows.into_iter().map(ExtractedRow::into_fields).collect(),
        }
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows (header excluded).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the column whose trimmed name equals `name` exactly.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h.trim() == name)
    }

    /// Header followed by the data rows.
    pub fn iter_all(&self) -> impl Iterator<Item = &[String]> {
        std::iter::once(self.header.as_slice()).chain(self.rows.iter().map(Vec::as_slice))
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.header, self.rows)
    }

    /// Move the rows out, leaving the table empty.
    pub(crate) fn take_rows(&mut self) -> Vec<Vec<String>> {
        std::mem::take(&mut self.rows)
    }

    /// Put back a permutation of rows taken with [`Table::take_rows`].
    pub(crate) fn with_rows(mut self, rows: Vec<Vec<String>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == self.header.len()));
        self.rows = rows;
        self
    }
}
