//! # edgequake-tabconv
//!
//! Convert uploaded spreadsheets and PDF bank statements into downloadable
//! tabular files.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (.xlsx / .xls / .pdf)
//!  │
//!  ├─ 1. Input     store under a UUID name, detect kind by extension
//!  ├─ spreadsheet:
//!  │   ├─ 2. Read      first sheet via calamine (spawn_blocking)
//!  │   └─ 3. Write     CSV, rows in input order
//!  └─ pdf:
//!      ├─ 2. Text      raw text per page via pdfium (spawn_blocking)
//!      ├─ 3. Extract   one prompt to an LLM → CSV text
//!      ├─ 4. Parse     validate against the five statement columns
//!      ├─ 5. Sort      by Date; unparseable dates last, stable
//!      └─ 6. Write     XLSX, one sheet
//! ```
//!
//! The uploaded file is deleted on every exit path. The artifact is deleted
//! once its bytes have been read back for the response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_tabconv::{Converter, ConverterConfig, UploadedDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ConverterConfig::builder().scratch_dir("uploads").build()?;
//!     config.ensure_scratch_dir()?;
//!     let converter = Converter::from_config(config)?;
//!
//!     let bytes = std::fs::read("statement.pdf")?;
//!     let artifact = converter.convert_bytes("statement.pdf", &bytes, None).await?;
//!     println!("{} rows → {}", artifact.rows(), artifact.download_name());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `server`  | on      | HTTP router + the `tabconv` binary (axum, clap, anyhow, tracing-subscriber) |
//! | `bundled` | off     | Embed the pdfium shared library at compile time |
//!
//! Library-only use:
//! ```toml
//! edgequake-tabconv = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder};
pub use convert::Converter;
pub use error::{ConvertError, ErrorBody};
pub use output::{ConvertedArtifact, OutputFormat};
pub use pipeline::input::{DocumentKind, UploadedDocument};
pub use pipeline::llm::{ExtractionClient, LlmExtractionClient};
pub use pipeline::text::{PdfiumTextExtractor, TextExtractor};
pub use table::{ExtractedRow, Table, STATEMENT_COLUMNS};
