//! Error types for the edgequake-tabconv library.
//!
//! Every failure in the pipeline is a [`ConvertError`]. Each variant belongs
//! to exactly one stage, so the HTTP layer can map it to a status code and a
//! JSON body without knowing anything about the stage that produced it:
//!
//! | Variant | Kind | Status |
//! |---------|------|--------|
//! | [`ConvertError::NoFile`] | `NoFileError` | 400 |
//! | [`ConvertError::UnsupportedType`] | `UnsupportedTypeError` | 400 |
//! | [`ConvertError::EmptyInput`] | `EmptyInputError` | 400 |
//! | [`ConvertError::FileTooLarge`] | `FileTooLargeError` | 413 |
//! | [`ConvertError::SpreadsheetRead`] | `SpreadsheetReadError` | 500 |
//! | [`ConvertError::PdfParse`] | `PdfParseError` | 500 |
//! | [`ConvertError::ExternalExtraction`] | `ExternalExtractionError` | 500 |
//! | [`ConvertError::ExtractionParse`] | `ExtractionParseError` | 500 |
//! | [`ConvertError::Serialization`] | `SerializationError` | 500 |
//! | [`ConvertError::Unexpected`] | `UnexpectedError` | 500 |
//!
//! Nothing is retried. A conversion either returns a complete artifact or
//! one of these errors.

use serde::Serialize;
use thiserror::Error;

/// All errors returned by the edgequake-tabconv library.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Client errors ─────────────────────────────────────────────────────
    /// The request carried no `file` field, or the stored upload vanished.
    #[error("No file uploaded")]
    NoFile,

    /// Declared extension is not one of `.pdf`, `.xlsx`, `.xls`.
    #[error("Unsupported file type '{extension}'\nOnly Excel (.xlsx, .xls) and PDF files are allowed.")]
    UnsupportedType { extension: String },

    /// The input parsed but carried nothing to convert.
    #[error("No data found: {detail}")]
    EmptyInput { detail: String },

    /// Upload exceeded the configured size limit.
    #[error("File exceeds the {limit_bytes} byte upload limit")]
    FileTooLarge { limit_bytes: usize },

    // ── Processing errors ─────────────────────────────────────────────────
    /// The spreadsheet engine could not open or read the workbook.
    #[error("Failed to read spreadsheet: {detail}")]
    SpreadsheetRead { detail: String },

    /// The PDF is corrupt, encrypted, unreadable, or extraction timed out.
    #[error("PDF parsing error: {detail}")]
    PdfParse { detail: String },

    /// Transport, quota, or timeout failure talking to the external model.
    #[error("External extraction failed: {detail}")]
    ExternalExtraction { detail: String },

    /// The model answered, but not with the expected CSV schema.
    #[error("Could not parse extracted statement data: {detail}")]
    ExtractionParse { detail: String },

    /// Writing the CSV / XLSX artifact failed.
    #[error("Failed to write converted file: {detail}")]
    Serialization { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Unexpected server error: {0}")]
    Unexpected(String),
}

impl ConvertError {
    /// Taxonomy name of this error, e.g. `"UnsupportedTypeError"`.
    pub fn kind(&self) -> &'static str {
        match self {
            ConvertError::NoFile => "NoFileError",
            ConvertError::UnsupportedType { .. } => "UnsupportedTypeError",
            ConvertError::EmptyInput { .. } => "EmptyInputError",
            ConvertError::FileTooLarge { .. } => "FileTooLargeError",
            ConvertError::SpreadsheetRead { .. } => "SpreadsheetReadError",
            ConvertError::PdfParse { .. } => "PdfParseError",
            ConvertError::ExternalExtraction { .. } => "ExternalExtractionError",
            ConvertError::ExtractionParse { .. } => "ExtractionParseError",
            ConvertError::Serialization { .. } => "SerializationError",
            ConvertError::InvalidConfig(_) | ConvertError::Unexpected(_) => "UnexpectedError",
        }
    }

    /// HTTP status code this error maps to.
    pub fn status(&self) -> u16 {
        match self {
            ConvertError::NoFile
            | ConvertError::UnsupportedType { .. }
            | ConvertError::EmptyInput { .. } => 400,
            ConvertError::FileTooLarge { .. } => 413,
            _ => 500,
        }
    }

    /// `true` when the caller caused the failure (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Short human-readable headline for the `error` field of the JSON body.
    pub fn message(&self) -> &'static str {
        match self {
            ConvertError::NoFile => "No file uploaded",
            ConvertError::UnsupportedType { .. } => "Unsupported file type",
            ConvertError::EmptyInput { .. } => "No data found in uploaded file",
            ConvertError::FileTooLarge { .. } => "File too large",
            ConvertError::SpreadsheetRead { .. } => "Failed to read Excel file",
            ConvertError::PdfParse { .. } => "PDF parsing error",
            ConvertError::ExternalExtraction { .. } => "Failed to process PDF data",
            ConvertError::ExtractionParse { .. } => "Failed to parse extracted statement data",
            ConvertError::Serialization { .. } => "Failed to write converted file",
            ConvertError::InvalidConfig(_) | ConvertError::Unexpected(_) => {
                "Unexpected server error"
            }
        }
    }

    /// Underlying cause, when one is known.
    pub fn details(&self) -> Option<String> {
        match self {
            ConvertError::NoFile => None,
            ConvertError::UnsupportedType { extension } => {
                Some(format!("'{extension}' is not one of .pdf, .xlsx, .xls"))
            }
            ConvertError::FileTooLarge { limit_bytes } => {
                Some(format!("limit is {limit_bytes} bytes"))
            }
            ConvertError::EmptyInput { detail }
            | ConvertError::SpreadsheetRead { detail }
            | ConvertError::PdfParse { detail }
            | ConvertError::ExternalExtraction { detail }
            | ConvertError::ExtractionParse { detail }
            | ConvertError::Serialization { detail } => Some(detail.clone()),
            ConvertError::InvalidConfig(detail) | ConvertError::Unexpected(detail) => {
                Some(detail.clone())
            }
        }
    }

    /// Build the JSON body sent to the client.
    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.message().to_string(),
            details: self.details(),
        }
    }
}

/// JSON error body: `{"error": "...", "details": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
