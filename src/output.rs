//! Output types: the converted artifact and its format.

use crate::error::ConvertError;
use crate::pipeline::input::ScratchFile;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Serialization format of a converted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Xlsx,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Csv => "text/csv; charset=utf-8",
            OutputFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "xlsx" => Ok(OutputFormat::Xlsx),
            other => Err(ConvertError::UnsupportedType {
                extension: format!(".{other}"),
            }),
        }
    }
}

/// A converted file in scratch storage, ready to stream to the client.
///
/// The file is removed when the artifact is dropped, so holding one past
/// the response is the only way to keep it on disk.
#[derive(Debug)]
pub struct ConvertedArtifact {
    file: ScratchFile,
    download_name: String,
    format: OutputFormat,
    rows: usize,
}

impl ConvertedArtifact {
    pub(crate) fn new(file: ScratchFile, download_name: String, format: OutputFormat, rows: usize) -> Self {
        Self {
            file,
            download_name,
            format,
            rows,
        }
    }

    /// Location of the artifact in scratch storage.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Filename suggested to the client, e.g. `statement_converted.xlsx`.
    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Number of data rows written (header excluded).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Read the artifact into memory and delete it from scratch storage.
    pub async fn into_bytes(self) -> Result<Vec<u8>, ConvertError> {
        let bytes = tokio::fs::read(self.file.path())
            .await
            .map_err(|e| ConvertError::Serialization {
                detail: format!("cannot read artifact back: {e}"),
            })?;
        self.file.remove();
        Ok(bytes)
    }
}
