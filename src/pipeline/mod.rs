//! Pipeline stages for document conversion.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the orchestrator in [`crate::convert`] only
//! sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! spreadsheet:  input ──▶ spreadsheet ───────────────────────────▶ serialize (csv)
//! pdf:          input ──▶ text ──▶ prompts ──▶ llm ──▶ parse ──▶ sort ──▶ serialize (xlsx)
//! ```
//!
//! 1. [`input`]       : uploaded document, kind detection, scratch-file cleanup
//! 2. [`spreadsheet`] : read the first sheet; first row names the columns
//! 3. [`text`]        : raw text from the PDF; pdfium runs in `spawn_blocking`
//! 4. [`llm`]         : one prompt-completion call; the only network I/O
//! 5. [`parse`]       : validate the model's CSV against the statement schema
//! 6. [`sort`]        : order rows by date, unparseable dates last
//! 7. [`serialize`]   : CSV text or XLSX workbook, written atomically

pub mod input;
pub mod llm;
pub mod parse;
pub mod serialize;
pub mod sort;
pub mod spreadsheet;
pub mod text;
