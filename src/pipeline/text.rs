//! PDF text extraction via pdfium.
//!
//! ## Why a trait?
//!
//! The orchestrator only needs "path in, text out". Putting that behind
//! [`TextExtractor`] lets tests drive the PDF pipeline with canned text and
//! no pdfium library on the machine.
//!
//! ## Why spawn_blocking?
//!
//! pdfium is a C++ library behind FFI; its calls block. Running them on the
//! blocking pool keeps the Tokio workers free, and the caller sees a single
//! awaitable with two outcomes: the text, or a [`ConvertError::PdfParse`].

use crate::error::ConvertError;
use crate::pipeline::input::check_pdf_magic;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Extracts the raw text content of a PDF.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Return every page's text, pages separated by a blank line.
    async fn extract_text(&self, path: &Path) -> Result<String, ConvertError>;
}

/// [`TextExtractor`] backed by a pdfium library bound once per process.
pub struct PdfiumTextExtractor {
    pdfium: Arc<Pdfium>,
}

impl PdfiumTextExtractor {
    /// Bind to pdfium, downloading and caching the library on first use.
    pub fn new() -> Result<Self, ConvertError> {
        let pdfium = pdfium_auto::bind_pdfium_silent().map_err(|e| {
            ConvertError::Unexpected(format!("PDF engine unavailable: {e}"))
        })?;
        Ok(Self::from_pdfium(pdfium))
    }

    pub fn from_pdfium(pdfium: Pdfium) -> Self {
        Self {
            pdfium: Arc::new(pdfium),
        }
    }
}

#[async_trait]
impl TextExtractor for PdfiumTextExtractor {
    async fn extract_text(&self, path: &Path) -> Result<String, ConvertError> {
        check_pdf_magic(path)?;
        let pdfium = Arc::clone(&self.pdfium);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_text_blocking(&pdfium, &path))
            .await
            .map_err(|e| ConvertError::Unexpected(format!("Text extraction task panicked: {e}")))?
    }
}

fn extract_text_blocking(pdfium: &Pdfium, path: &Path) -> Result<String, ConvertError> {
    let document = pdfium.load_pdf_from_file(path, None).map_err(|e| {
        let err_str = format!("{e:?}");
        if err_str.contains("Password") || err_str.contains("password") {
            ConvertError::PdfParse {
                detail: "document is encrypted and requires a password".into(),
            }
        } else {
            ConvertError::PdfParse { detail: err_str }
        }
    })?;

    let pages = document.pages();
    let mut parts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page.text().map_err(|e| ConvertError::PdfParse {
            detail: format!("page {}: {e:?}", idx + 1),
        })?;
        let all = text.all();
        debug!("Page {}: {} chars of text", idx + 1, all.len());
        parts.push(all);
    }
    info!("Extracted text from {} pages of {}", parts.len(), path.display());

    Ok(join_pages(&parts))
}

/// Join page texts with a blank line, skipping pages that carry no text.
pub fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim_end())
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_skips_blank_pages() {
        let pages = vec!["a  \n".to_string(), "   ".to_string(), "b".to_string()];
        assert_eq!(join_pages(&pages), "a\n\nb");
    }

    #[test]
    fn join_empty_document() {
        assert_eq!(join_pages(&[]), "");
    }
}
