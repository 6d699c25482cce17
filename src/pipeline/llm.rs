//! External extraction: send the prompt to an LLM and return its text.
//!
//! The model is an opaque collaborator. [`ExtractionClient`] has one method
//! so tests can substitute a canned response. The production implementation,
//! [`LlmExtractionClient`], wraps any edgequake-llm provider.
//!
//! The call is single-shot: no retry, no streaming. Any transport, quota or
//! authentication failure surfaces as [`ConvertError::ExternalExtraction`].

use crate::config::ConverterConfig;
use crate::error::ConvertError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Model used when Gemini is picked from `GEMINI_API_KEY`.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Model used with a named provider when none is configured.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Prompt in, free text out.
#[async_trait]
pub trait ExtractionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ConvertError>;
}

/// [`ExtractionClient`] backed by an edgequake-llm provider.
pub struct LlmExtractionClient {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmExtractionClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConverterConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }

    /// Resolve a provider from `config` and the environment.
    pub fn from_config(config: &ConverterConfig) -> Result<Self, ConvertError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl ExtractionClient for LlmExtractionClient {
    async fn complete(&self, prompt: &str) -> Result<String, ConvertError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(prompt)];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| ConvertError::ExternalExtraction {
                detail: e.to_string(),
            })?;

        debug!(
            "Extraction call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        info!("Model returned {} bytes", response.content.len());
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the converter config.
fn build_options(config: &ConverterConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, ConvertError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ConvertError::ExternalExtraction {
            detail: format!("provider '{provider_name}' is not configured: {e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider** (`config.provider_name`) with `config.model`.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`.
/// 4. **Gemini** when `GEMINI_API_KEY` (or its alias `GOOGLE_API_KEY`) is set.
/// 5. **Auto-detection** via `ProviderFactory::from_env`.
pub fn resolve_provider(config: &ConverterConfig) -> Result<Arc<dyn LLMProvider>, ConvertError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(match name.as_str() {
            "gemini" => DEFAULT_GEMINI_MODEL,
            _ => DEFAULT_MODEL,
        });
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if gemini_key_present() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ConvertError::ExternalExtraction {
            detail: format!(
                "No LLM provider could be auto-detected from environment. \
                 Set GEMINI_API_KEY or OPENAI_API_KEY, or configure a provider. Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

/// Environment variables that carry a Gemini key, in lookup order.
const GEMINI_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

fn gemini_key_present() -> bool {
    gemini_api_key().is_some()
}

/// The Gemini key from `GEMINI_API_KEY`, falling back to `GOOGLE_API_KEY`.
///
/// The Gemini provider itself only reads `GEMINI_API_KEY`; the binary copies
/// the alias across at startup.
pub fn gemini_api_key() -> Option<String> {
    gemini_key_from(|var| std::env::var(var).ok())
}

/// First non-empty Gemini key found through `lookup`.
fn gemini_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    GEMINI_KEY_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .find(|k| !k.trim().is_empty())
}
