//! Input handling: uploaded documents and scratch-file lifetimes.
//!
//! ## Why a guard type?
//!
//! Uploads and artifacts live in a shared scratch directory. Every exit path
//! of a conversion (success, error, timeout, a dropped request future) must
//! remove them exactly once. [`ScratchFile`] deletes its file on drop, so
//! cleanup follows ownership instead of being repeated at every `return`.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Supported input kinds, detected from the declared extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// `.xlsx` or `.xls`
    Spreadsheet,
    /// `.pdf` bank statement
    Pdf,
}

impl DocumentKind {
    /// Detect the kind from an extension such as `.pdf`, `XLSX` or `xls`.
    pub fn from_extension(ext: &str) -> Result<Self, ConvertError> {
        let normalised = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalised.as_str() {
            "pdf" => Ok(DocumentKind::Pdf),
            "xlsx" | "xls" => Ok(DocumentKind::Spreadsheet),
            _ => Err(ConvertError::UnsupportedType {
                extension: format!(".{normalised}"),
            }),
        }
    }
}

/// Lower-cased extension of `name` including the dot, or `""` if none.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// An uploaded file waiting in scratch storage.
#[derive(Debug)]
pub struct UploadedDocument {
    file: ScratchFile,
    extension: String,
    original_name: String,
}

impl UploadedDocument {
    /// Take ownership of an upload already written to `path`.
    ///
    /// From here on the file is deleted when the document is dropped.
    pub fn new(path: impl Into<PathBuf>, original_name: impl Into<String>) -> Self {
        let original_name = original_name.into();
        Self {
            file: ScratchFile::adopt(path),
            extension: extension_of(&original_name),
            original_name,
        }
    }

    /// Write `bytes` into `scratch_dir` under a unique name and adopt it.
    pub async fn store(
        scratch_dir: &Path,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<Self, ConvertError> {
        let ext = extension_of(original_name);
        let path = scratch_dir.join(format!("{}{}", Uuid::new_v4(), ext));
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            ConvertError::Unexpected(format!("cannot store upload '{}': {e}", path.display()))
        })?;
        debug!("Stored upload '{}' at {}", original_name, path.display());
        Ok(Self::new(path, original_name))
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Declared extension, lower-cased, with the leading dot.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// File stem the client sent, used to name the download.
    pub fn stem(&self) -> String {
        Path::new(&self.original_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "converted".to_string())
    }
}

/// A file in scratch storage that is deleted when dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: Option<PathBuf>,
}

impl ScratchFile {
    /// Take ownership of an existing (or soon to exist) file.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A fresh unique path in `dir`, e.g. `{uuid}_converted.csv`.
    pub fn unique_in(dir: &Path, suffix: &str) -> Self {
        Self::adopt(dir.join(format!("{}{}", Uuid::new_v4(), suffix)))
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or_else(|| Path::new(""))
    }

    /// Delete the file now instead of at drop.
    pub fn remove(mut self) {
        self.delete();
    }

    fn delete(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed scratch file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
            }
        }
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        self.delete();
    }
}

/// Check that `path` exists, is non-empty, and return its size.
pub fn check_present(path: &Path) -> Result<u64, ConvertError> {
    let meta = std::fs::metadata(path).map_err(|_| ConvertError::NoFile)?;
    if meta.len() == 0 {
        return Err(ConvertError::EmptyInput {
            detail: "uploaded file is empty".into(),
        });
    }
    Ok(meta.len())
}

/// Verify the `%PDF` magic bytes so a mislabelled upload fails cleanly
/// before it reaches the PDF engine.
pub fn check_pdf_magic(path: &Path) -> Result<(), ConvertError> {
    use std::io::Read;

    let mut f = std::fs::File::open(path).map_err(|e| ConvertError::PdfParse {
        detail: format!("cannot open '{}': {e}", path.display()),
    })?;
    let mut magic = [0u8; 4];
    if f.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(ConvertError::PdfParse {
            detail: format!("not a PDF file (first bytes: {magic:?})"),
        });
    }
    Ok(())
}
