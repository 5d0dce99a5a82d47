//! HTTP extraction service.
//!
//! `POST /parse` takes a multipart upload (field `file`), `POST /parse-url`
//! a JSON body `{"path": "..."}` naming a file on the server. Both answer
//! with the extraction result; failures answer `{"error": "..."}`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use pdfsift::{Error, ExtractionResult};

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Room for multipart boundaries and part headers on top of the payload.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Service configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub bind: String,

    /// Uploads larger than this are refused with 413
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn new(bind: impl Into<String>) -> Self {
        Self {
            bind: bind.into(),
            ..Self::default()
        }
    }

    /// Set the upload ceiling in MiB.
    pub fn with_max_upload_mb(mut self, mb: usize) -> Self {
        self.max_upload_bytes = mb.saturating_mul(1024 * 1024);
        self
    }

    /// Set the upload ceiling in bytes.
    pub fn with_max_upload_bytes(mut self, bytes: usize) -> Self {
        self.max_upload_bytes = bytes;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Error response: a status and `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidDocument(_) | Error::UnknownFormat => StatusCode::UNPROCESSABLE_ENTITY,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotAFile(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            log::error!("{} {}", self.status, self.message);
        } else {
            log::warn!("{} {}", self.status, self.message);
        }
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Default, Deserialize)]
struct PathRequest {
    #[serde(default)]
    path: String,
}

/// Build the service router.
pub fn router(config: ServerConfig) -> Router {
    let body_limit = config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD);
    Router::new()
        .route("/parse", post(parse_upload))
        .route("/parse-url", post(parse_path))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(Arc::new(config))
}

/// Listen on `config.bind` until the process ends.
pub async fn serve(config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    log::info!(
        "Listening on {} (uploads up to {} bytes)",
        listener.local_addr()?,
        config.max_upload_bytes
    );
    axum::serve(listener, router(config)).await
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn parse_upload(
    State(config): State<Arc<ServerConfig>>,
    mut multipart: Multipart,
) -> Result<Json<ExtractionResult>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| ApiError::bad_request("No file field in request"))?;
    if filename.is_empty() {
        return Err(ApiError::bad_request("Empty filename"));
    }
    if !filename.to_lowercase().ends_with(".pdf") {
        return Err(ApiError::bad_request("Uploaded file must be a PDF"));
    }
    if data.len() > config.max_upload_bytes {
        return Err(Error::PayloadTooLarge {
            size: data.len(),
            limit: config.max_upload_bytes,
        }
        .into());
    }

    let result = tokio::task::spawn_blocking(move || pdfsift::parse_bytes(&data))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;
    log::info!(
        "Parsed upload {} ({} page(s), {} warning(s))",
        filename,
        result.metadata.num_pages,
        result.warnings.len()
    );
    Ok(Json(result))
}

async fn parse_path(body: Bytes) -> Result<Json<ExtractionResult>, ApiError> {
    // Unreadable bodies count as a missing path.
    let request: PathRequest = serde_json::from_slice(&body).unwrap_or_default();
    let path = request.path.trim();
    if path.is_empty() {
        return Err(ApiError::bad_request("Missing 'path' in JSON body"));
    }

    let path = PathBuf::from(path);
    let result = pdfsift::parse_file_async(&path).await?;
    log::info!(
        "Parsed {} ({} page(s), {} warning(s))",
        path.display(),
        result.metadata.num_pages,
        result.warnings.len()
    );
    Ok(Json(result))
}
