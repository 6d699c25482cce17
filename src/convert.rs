//! Conversion entry points.
//!
//! [`Converter`] dispatches on the uploaded document's kind and sequences
//! the pipeline stages:
//!
//! - **spreadsheet** → read first sheet → CSV (rows in input order)
//! - **PDF** → extract text → prompt → model → parse → sort by date → XLSX
//!
//! The input document is consumed by value and dropped before `convert`
//! returns, so it leaves scratch storage on every exit path. The artifact
//! comes back as a [`ConvertedArtifact`] that owns its own file.

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use crate::output::{ConvertedArtifact, OutputFormat};
use crate::pipeline::input::{check_present, DocumentKind, ScratchFile, UploadedDocument};
use crate::pipeline::llm::{ExtractionClient, LlmExtractionClient};
use crate::pipeline::text::{PdfiumTextExtractor, TextExtractor};
use crate::pipeline::{parse, serialize, sort, spreadsheet};
use crate::prompts::build_extraction_prompt;
use crate::table::Table;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Converts uploaded documents into CSV / XLSX artifacts.
///
/// Cheap to share: wrap in an `Arc` and call from any number of requests.
/// Requests share nothing but the scratch directory, and every file they
/// create there has a UUID name.
pub struct Converter {
    config: ConverterConfig,
    extractor: Arc<dyn TextExtractor>,
    client: Arc<dyn ExtractionClient>,
}

impl Converter {
    /// Assemble a converter from explicit collaborators.
    pub fn new(
        config: ConverterConfig,
        extractor: Arc<dyn TextExtractor>,
        client: Arc<dyn ExtractionClient>,
    ) -> Self {
        Self {
            config,
            extractor,
            client,
        }
    }

    /// Bind pdfium and resolve the LLM provider from `config` / environment.
    pub fn from_config(config: ConverterConfig) -> Result<Self, ConvertError> {
        let extractor = Arc::new(PdfiumTextExtractor::new()?);
        let client = Arc::new(LlmExtractionClient::from_config(&config)?);
        Ok(Self::new(config, extractor, client))
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// Convert with the output format inferred from the input kind.
    pub async fn convert(&self, doc: UploadedDocument) -> Result<ConvertedArtifact, ConvertError> {
        self.convert_as(doc, None).await
    }

    /// Convert, optionally forcing the output format.
    ///
    /// # Errors
    /// Any stage failure, mapped to its [`ConvertError`] variant. The input
    /// file is removed whether or not this returns `Ok`.
    pub async fn convert_as(
        &self,
        doc: UploadedDocument,
        format: Option<OutputFormat>,
    ) -> Result<ConvertedArtifact, ConvertError> {
        let start = Instant::now();
        info!(
            "Starting conversion: '{}' at {}",
            doc.original_name(),
            doc.path().display()
        );

        let result = self.run(&doc, format).await;
        drop(doc);

        match &result {
            Ok(artifact) => info!(
                "Conversion complete: {} rows → {} in {}ms",
                artifact.rows(),
                artifact.path().display(),
                start.elapsed().as_millis()
            ),
            Err(e) => warn!("Conversion failed ({}): {}", e.kind(), e),
        }
        result
    }

    /// Store raw upload bytes in scratch storage, then convert them.
    ///
    /// The extension is checked first: an unsupported upload is rejected
    /// without touching the disk.
    pub async fn convert_bytes(
        &self,
        original_name: &str,
        bytes: &[u8],
        format: Option<OutputFormat>,
    ) -> Result<ConvertedArtifact, ConvertError> {
        let ext = crate::pipeline::input::extension_of(original_name);
        DocumentKind::from_extension(&ext)?;
        if bytes.len() > self.config.max_upload_bytes {
            return Err(ConvertError::FileTooLarge {
                limit_bytes: self.config.max_upload_bytes,
            });
        }
        let doc = UploadedDocument::store(&self.config.scratch_dir, original_name, bytes).await?;
        self.convert_as(doc, format).await
    }

    async fn run(
        &self,
        doc: &UploadedDocument,
        format: Option<OutputFormat>,
    ) -> Result<ConvertedArtifact, ConvertError> {
        let kind = DocumentKind::from_extension(doc.extension())?;
        let size = check_present(doc.path())?;
        debug!("Detected {:?} input, {} bytes", kind, size);

        let (table, inferred) = match kind {
            DocumentKind::Spreadsheet => (
                spreadsheet::read_first_sheet(doc.path()).await?,
                OutputFormat::Csv,
            ),
            DocumentKind::Pdf => (self.extract_statement(doc.path()).await?, OutputFormat::Xlsx),
        };

        self.write_artifact(&table, format.unwrap_or(inferred), &doc.stem())
            .await
    }

    /// PDF path: text → prompt → model → parse → sort.
    async fn extract_statement(&self, path: &Path) -> Result<Table, ConvertError> {
        let extract_secs = self.config.extract_timeout_secs;
        let text = timeout(
            Duration::from_secs(extract_secs),
            self.extractor.extract_text(path),
        )
        .await
        .map_err(|_| ConvertError::PdfParse {
            detail: format!("text extraction timed out after {extract_secs}s"),
        })??;

        if text.trim().is_empty() {
            return Err(ConvertError::EmptyInput {
                detail: "PDF contains no extractable text".into(),
            });
        }
        info!("Extracted {} chars of statement text", text.len());

        let prompt = build_extraction_prompt(&text);
        let api_secs = self.config.api_timeout_secs;
        let response = timeout(Duration::from_secs(api_secs), self.client.complete(&prompt))
            .await
            .map_err(|_| ConvertError::ExternalExtraction {
                detail: format!("model call timed out after {api_secs}s"),
            })??;

        let table = parse::parse_statement_csv(&response)?;
        Ok(sort::sort_by_date(table))
    }

    async fn write_artifact(
        &self,
        table: &Table,
        format: OutputFormat,
        stem: &str,
    ) -> Result<ConvertedArtifact, ConvertError> {
        let suffix = format!("_converted.{}", format.extension());
        let file = ScratchFile::unique_in(&self.config.scratch_dir, &suffix);
        serialize::write_table(table, format, &self.config.sheet_name, file.path()).await?;
        Ok(ConvertedArtifact::new(
            file,
            format!("{stem}{suffix}"),
            format,
            table.len(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedText(&'static str);

    #[async_trait]
    impl TextExtractor for FixedText {
        async fn extract_text(&self, _path: &Path) -> Result<String, ConvertError> {
            Ok(self.0.to_string())
        }
    }

    struct CountingClient {
        reply: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExtractionClient for CountingClient {
        async fn complete(&self, prompt: &str) -> Result<String, ConvertError> {
            assert!(prompt.contains("Here is the text from the bank statement"));
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    struct SlowClient;

    #[async_trait]
    impl ExtractionClient for SlowClient {
        async fn complete(&self, _prompt: &str) -> Result<String, ConvertError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    fn converter(
        dir: &Path,
        text: &'static str,
        client: Arc<dyn ExtractionClient>,
    ) -> Converter {
        let config = ConverterConfig::builder()
            .scratch_dir(dir)
            .api_timeout_secs(1)
            .build()
            .unwrap();
        Converter::new(config, Arc::new(FixedText(text)), client)
    }

    fn counting(reply: &'static str) -> Arc<CountingClient> {
        Arc::new(CountingClient {
            reply,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn pdf_path_calls_model_once_and_names_download() {
        let tmp = tempfile::tempdir().unwrap();
        let client = counting("Date,Transaction ID,Sender/Receiver Name,Debit,Credit\n2024-01-01,T,N,1,\n");
        let conv = converter(tmp.path(), "statement text", client.clone());
        let artifact = conv
            .convert_bytes("jan.pdf", b"%PDF-1.4 fake", None)
            .await
            .unwrap();
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert_eq!(artifact.format(), OutputFormat::Xlsx);
        assert_eq!(artifact.download_name(), "jan_converted.xlsx");
        assert_eq!(artifact.rows(), 1);
    }

    #[tokio::test]
    async fn blank_pdf_text_is_empty_input() {
        let tmp = tempfile::tempdir().unwrap();
        let client = counting("unused");
        let conv = converter(tmp.path(), "   \n", client.clone());
        let err = conv.convert_bytes("a.pdf", b"%PDF", None).await.unwrap_err();
        assert_eq!(err.kind(), "EmptyInputError");
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_timeout_is_external_error() {
        let tmp = tempfile::tempdir().unwrap();
        let conv = converter(tmp.path(), "text", Arc::new(SlowClient));
        let err = conv.convert_bytes("a.pdf", b"%PDF", None).await.unwrap_err();
        assert_eq!(err.kind(), "ExternalExtractionError");
        assert!(err.to_string().contains("timed out"));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unsupported_upload_never_written() {
        let tmp = tempfile::tempdir().unwrap();
        let conv = converter(tmp.path(), "", counting(""));
        let err = conv.convert_bytes("notes.docx", b"PK", None).await.unwrap_err();
        assert_eq!(err.kind(), "UnsupportedTypeError");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn oversize_upload_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ConverterConfig::builder()
            .scratch_dir(tmp.path())
            .max_upload_bytes(4)
            .build()
            .unwrap();
        let conv = Converter::new(config, Arc::new(FixedText("")), counting(""));
        let err = conv.convert_bytes("a.pdf", b"%PDF-1.4", None).await.unwrap_err();
        assert_eq!(err.status(), 413);
    }

    #[tokio::test]
    async fn empty_upload_is_empty_input() {
        let tmp = tempfile::tempdir().unwrap();
        let conv = converter(tmp.path(), "", counting(""));
        let err = conv.convert_bytes("a.xlsx", b"", None).await.unwrap_err();
        assert_eq!(err.kind(), "EmptyInputError");
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
