//! HTTP surface: upload a document, download the converted file.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /` | liveness text |
//! | `POST /api/convert` | multipart field `file`; optional `?format=csv\|xlsx` |
//! | anything else | `404 {"error": "Route not found"}` |
//!
//! The scratch directory is deliberately not served: it holds other
//! clients' in-flight uploads.

use crate::convert::Converter;
use crate::error::{ConvertError, ErrorBody};
use crate::output::OutputFormat;
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, DefaultBodyLimit, Multipart,
        Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Multipart slack on top of the file itself (boundaries, part headers).
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind. Default: `0.0.0.0`.
    pub host: String,
    /// Listen port. Default: 8000.
    pub port: u16,
    /// Origins allowed to call the API from a browser.
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared application state.
#[derive(Clone)]
struct AppState {
    converter: Arc<Converter>,
}

/// A [`ConvertError`] on its way to the client.
pub struct ApiError {
    error: ConvertError,
    details: Option<String>,
}

impl ApiError {
    /// Replace the error's own `details` with `details`.
    pub fn with_details(error: ConvertError, details: impl Into<String>) -> Self {
        Self {
            error,
            details: Some(details.into()),
        }
    }
}

impl From<ConvertError> for ApiError {
    fn from(error: ConvertError) -> Self {
        Self {
            error,
            details: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let e = &self.error;
        let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("{} → {}: {}", e.kind(), status, e);
        } else {
            warn!("{} → {}: {}", e.kind(), status, e);
        }
        let mut body = e.to_body();
        if self.details.is_some() {
            body.details = self.details;
        }
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct ConvertQuery {
    format: Option<String>,
}

/// Build the router with CORS, request tracing and the upload limit applied.
pub fn router(converter: Arc<Converter>, config: &ServerConfig) -> Router {
    let body_limit = converter.config().max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let state = AppState { converter };

    let api_routes = Router::new()
        .route("/convert", post(convert_upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state);

    Router::new()
        .route("/", get(liveness))
        .nest("/api", api_routes)
        .fallback(not_found)
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

/// GET / - liveness
async fn liveness() -> &'static str {
    "Backend is running. Try POST /api/convert"
}

async fn not_found(uri: axum::http::Uri) -> impl IntoResponse {
    warn!("Route not found: {}", uri);
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Route not found".to_string(),
            details: None,
        }),
    )
}

/// POST /api/convert - multipart upload, converted file download
async fn convert_upload(
    State(state): State<AppState>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|rejection| {
        ApiError::with_details(
            ConvertError::UnsupportedType {
                extension: "?format".into(),
            },
            rejection.body_text(),
        )
    })?;
    let mut multipart = multipart
        .map_err(|rejection| ApiError::with_details(ConvertError::NoFile, rejection.body_text()))?;

    let format = query
        .format
        .as_deref()
        .map(str::parse::<OutputFormat>)
        .transpose()?;
    let limit = state.converter.config().max_upload_bytes;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e, limit))? {
        if field.name() != Some("file") {
            continue;
        }
        let original_name = field.file_name().unwrap_or_default().to_string();
        info!("Incoming file: '{}'", original_name);

        let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
        let artifact = state
            .converter
            .convert_bytes(&original_name, &bytes, format)
            .await?;

        let content_type = artifact.format().mime_type();
        let disposition = format!(
            "attachment; filename=\"{}\"",
            artifact.download_name().replace(['"', '\\', '\r', '\n'], "_")
        );
        let body = artifact.into_bytes().await?;

        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            body,
        )
            .into_response());
    }

    Err(ConvertError::NoFile.into())
}

fn multipart_error(e: axum::extract::multipart::MultipartError, limit: usize) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ConvertError::FileTooLarge { limit_bytes: limit }.into()
    } else {
        ConvertError::NoFile.into()
    }
}
