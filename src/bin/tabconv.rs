//! HTTP server binary for edgequake-tabconv.
//!
//! Maps flags / environment to `ConverterConfig` + `ServerConfig`, makes
//! sure the scratch directory and the pdfium engine exist, then serves
//! until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_tabconv::server::{router, ServerConfig};
use edgequake_tabconv::{Converter, ConverterConfig};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"ENDPOINTS:
  GET  /               liveness check
  POST /api/convert    multipart field "file" (.xlsx, .xls, .pdf)
                       ?format=csv|xlsx forces the output format

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (preferred when set)
  GOOGLE_API_KEY          Alias for GEMINI_API_KEY
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium; skips auto-download
  PDFIUM_AUTO_CACHE_DIR   Override the default pdfium cache directory
  RUST_LOG                Log filter, e.g. edgequake_tabconv=debug,tower_http=debug

EXAMPLE:
  GEMINI_API_KEY=... tabconv --port 8000 --allowed-origin http://localhost:5173
  curl -F file=@statement.pdf -OJ http://localhost:8000/api/convert
"#;

/// Convert uploaded spreadsheets and PDF bank statements to CSV / XLSX.
#[derive(Parser, Debug)]
#[command(
    name = "tabconv",
    version,
    about = "HTTP service converting spreadsheets and PDF bank statements to CSV / XLSX",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Listen port.
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// Interface to bind.
    #[arg(long, env = "TABCONV_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for uploads and generated artifacts.
    #[arg(long, env = "TABCONV_SCRATCH_DIR", default_value = "uploads")]
    scratch_dir: PathBuf,

    /// Browser origin allowed by CORS (repeatable, or comma-separated in env).
    #[arg(
        long = "allowed-origin",
        env = "CLIENT_URL",
        value_delimiter = ',',
        default_value = "http://localhost:5173"
    )]
    allowed_origins: Vec<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gemini-2.0-flash, gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Max LLM output tokens for one statement.
    #[arg(long, env = "TABCONV_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// PDF text extraction timeout in seconds.
    #[arg(long, env = "TABCONV_EXTRACT_TIMEOUT", default_value_t = 60)]
    extract_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "TABCONV_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Largest accepted upload in bytes.
    #[arg(long, env = "TABCONV_MAX_UPLOAD_BYTES", default_value_t = edgequake_tabconv::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TABCONV_VERBOSE")]
    verbose: bool,
}

fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .scratch_dir(&cli.scratch_dir)
        .max_tokens(cli.max_tokens)
        .extract_timeout_secs(cli.extract_timeout)
        .api_timeout_secs(cli.api_timeout)
        .max_upload_bytes(cli.max_upload_bytes);
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m);
    }
    builder.build().context("Invalid configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else {
        "info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // The Gemini provider reads GEMINI_API_KEY only.
    if std::env::var("GEMINI_API_KEY").map_or(true, |k| k.trim().is_empty()) {
        if let Some(key) = edgequake_tabconv::pipeline::llm::gemini_api_key() {
            info!("Using GOOGLE_API_KEY as GEMINI_API_KEY");
            std::env::set_var("GEMINI_API_KEY", key);
        }
    }

    let config = build_config(&cli)?;
    config
        .ensure_scratch_dir()
        .with_context(|| format!("Cannot create scratch dir {}", cli.scratch_dir.display()))?;

    // ── Ensure PDFium engine is available ───────────────────────────────
    // First start downloads ~30 MB; later starts only check the cache path.
    #[cfg(feature = "bundled")]
    {
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_bundled())
            .context("Failed to extract bundled PDFium engine")?;
    }

    #[cfg(not(feature = "bundled"))]
    if !pdfium_auto::is_pdfium_cached() {
        info!("Downloading PDFium engine (first start)…");
        tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
            .context("Failed to download PDFium engine")?;
    }

    let converter = Arc::new(Converter::from_config(config).context("Failed to start converter")?);

    let server_config = ServerConfig {
        host: cli.host.clone(),
        port: cli.port,
        allowed_origins: cli.allowed_origins.clone(),
    };
    let app = router(converter, &server_config);

    let addr = server_config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Cannot bind {addr}"))?;
    info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
