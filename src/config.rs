//! Configuration types for document conversion.
//!
//! All conversion behaviour is controlled through [`ConverterConfig`], built
//! via its [`ConverterConfigBuilder`]. The scratch directory is a value in
//! here rather than a path derived from the working directory, so tests can
//! point it at a throwaway sandbox.

use crate::error::ConvertError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default upload limit: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Sheet name used for every generated workbook.
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Configuration for a [`crate::convert::Converter`].
///
/// # Example
/// ```rust
/// use edgequake_tabconv::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .scratch_dir("/tmp/tabconv")
///     .model("gemini-2.0-flash")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_timeout_secs, 90);
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Directory holding uploaded inputs and generated artifacts. Default: `uploads`.
    ///
    /// Files in here live for one request only. The directory itself is
    /// created idempotently at startup.
    pub scratch_dir: PathBuf,

    /// LLM model identifier, e.g. "gemini-2.0-flash", "gpt-4.1-nano".
    /// If None, the provider default is used.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the extraction call. Default: 0.0.
    ///
    /// Extraction is transcription; any creativity shows up as invented rows.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 8192.
    ///
    /// A long statement produces one CSV line per transaction; too low a cap
    /// silently truncates the table.
    pub max_tokens: usize,

    /// Upper bound on PDF text extraction, in seconds. Default: 60.
    pub extract_timeout_secs: u64,

    /// Upper bound on the external model call, in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Largest accepted upload in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Worksheet name for XLSX output. Default: "Sheet1".
    pub sheet_name: String,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            scratch_dir: PathBuf::from("uploads"),
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 8192,
            extract_timeout_secs: 60,
            api_timeout_secs: 120,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("scratch_dir", &self.scratch_dir)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("extract_timeout_secs", &self.extract_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("sheet_name", &self.sheet_name)
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }

    /// Create the scratch directory if it does not exist yet.
    pub fn ensure_scratch_dir(&self) -> Result<(), ConvertError> {
        std::fs::create_dir_all(&self.scratch_dir).map_err(|e| {
            ConvertError::Unexpected(format!(
                "cannot create scratch dir '{}': {e}",
                self.scratch_dir.display()
            ))
        })
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = dir.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn sheet_name(mut self, name: impl Into<String>) -> Self {
        self.config.sheet_name = name.into();
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, ConvertError> {
        let c = &self.config;
        if c.scratch_dir.as_os_str().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "scratch directory must not be empty".into(),
            ));
        }
        if c.extract_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(ConvertError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(ConvertError::InvalidConfig(
                "upload limit must be ≥ 1 byte".into(),
            ));
        }
        // Excel rejects empty names, names over 31 chars and these characters.
        let name = &c.sheet_name;
        if name.is_empty()
            || name.chars().count() > 31
            || name.contains(['[', ']', ':', '*', '?', '/', '\\'])
        {
            return Err(ConvertError::InvalidConfig(format!(
                "invalid worksheet name '{name}'"
            )));
        }
        Ok(self.config)
    }
}
