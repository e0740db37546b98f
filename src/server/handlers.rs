//! HTTP request handlers for the thumbnail API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check endpoint
//! - `GET /{prefix}/{group}/{sub/path...}/{basename}[,k_v]*.{ext}` - Thumbnail
//!   (served by the router fallback, since the path depth is open-ended)

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::backend;
use crate::error::{BackendError, ThumbError};
use crate::pipeline::{Failure, Outcome, Rendered, Thumber};
use crate::route::RequestContext;
use crate::settings::DebugLevel;

/// Default Cache-Control max-age for served thumbnails (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

/// Default number of transforms allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_TRANSFORMS: usize = 8;

/// Header carrying the error message at debug level 1.
pub const ERROR_HEADER: &str = "x-thumb-error";

/// Header reporting how the disk cache took part in a response.
pub const CACHE_HEADER: &str = "x-thumb-cache";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the thumbnail processor.
///
/// This is passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Request processor holding the group configuration
    pub thumber: Arc<Thumber>,

    /// Bounds concurrent transforms on the blocking pool
    pub permits: Arc<Semaphore>,

    /// Cache-Control max-age in seconds for served images
    pub cache_max_age: u32,

    /// Script name reported for front-controller style deployments
    pub script_name: Option<String>,
}

impl AppState {
    /// Create application state with default limits.
    pub fn new(thumber: Thumber) -> Self {
        Self {
            thumber: Arc::new(thumber),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_TRANSFORMS)),
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            script_name: None,
        }
    }

    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Limit concurrent transforms (minimum one).
    pub fn with_max_concurrent_transforms(mut self, permits: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(permits.max(1)));
        self
    }

    pub fn with_script_name(mut self, script_name: Option<String>) -> Self {
        self.script_name = script_name.filter(|s| !s.is_empty());
        self
    }

    /// Run the pipeline for `ctx` on the blocking pool.
    pub async fn process(&self, ctx: RequestContext) -> Outcome {
        let fallback = self.thumber.settings().fallback().clone();
        let internal = |message: String| {
            Outcome::Fail(Failure::new(
                ThumbError::Io(message),
                fallback.debug,
                fallback.error_url.clone(),
            ))
        };

        let permit = match Arc::clone(&self.permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return internal("transform pool is closed".to_string()),
        };

        let thumber = Arc::clone(&self.thumber);
        let result = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            thumber.process(ctx)
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(e) => internal(format!("transform task failed: {}", e)),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_request")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Status, error type and message for a pipeline error.
fn error_parts(err: &ThumbError) -> (StatusCode, &'static str, String) {
    match err {
        ThumbError::InvalidRequest(_) => {
            (StatusCode::BAD_REQUEST, "invalid_request", err.to_string())
        }
        ThumbError::GroupNotConfigured { .. } => {
            (StatusCode::NOT_FOUND, "group_not_configured", err.to_string())
        }
        ThumbError::SourceNotFound { .. } => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
        ThumbError::SourceRootMissing { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "configuration_error",
            err.to_string(),
        ),
        ThumbError::Backend(BackendError::Decode(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "decode_error",
            err.to_string(),
        ),
        ThumbError::Backend(BackendError::Encode(_)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "encode_error",
            err.to_string(),
        ),
        ThumbError::Backend(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "backend_error",
            err.to_string(),
        ),
        ThumbError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_error", err.to_string()),
    }
}

/// Log errors based on severity:
/// - 5xx errors at ERROR level
/// - 404s at DEBUG level (common and expected)
/// - other 4xx errors at WARN level
fn log_error(status: StatusCode, error_type: &str, message: &str) {
    if status.is_server_error() {
        error!(
            error_type = error_type,
            status = status.as_u16(),
            "Server error: {}",
            message
        );
    } else if status == StatusCode::NOT_FOUND {
        debug!(
            error_type = error_type,
            status = status.as_u16(),
            "Resource not found: {}",
            message
        );
    } else {
        warn!(
            error_type = error_type,
            status = status.as_u16(),
            "Client error: {}",
            message
        );
    }
}

/// Convert ThumbError to a JSON HTTP response.
impl IntoResponse for ThumbError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = error_parts(&self);
        log_error(status, error_type, &message);

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

/// Present a failure according to its debug level.
///
/// - `Silent`: the fallback image with the mapped status
/// - `Header`: the same, plus the message in `X-Thumb-Error`
/// - `Raise`: the JSON error body
///
/// Without a readable fallback image every level degrades to `Raise`.
fn failure_response(failure: Failure) -> Response {
    if failure.debug == DebugLevel::Raise {
        return failure.error.into_response();
    }

    let Some((body, content_type)) = failure.error_url.as_deref().and_then(read_fallback_image)
    else {
        return failure.error.into_response();
    };

    let (status, error_type, message) = error_parts(&failure.error);
    log_error(status, error_type, &message);

    if failure.debug == DebugLevel::Header {
        (
            status,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (header::HeaderName::from_static(ERROR_HEADER), header_safe(&message)),
            ],
            body,
        )
            .into_response()
    } else {
        (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
    }
}

fn read_fallback_image(path: &Path) -> Option<(Vec<u8>, &'static str)> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let content_type = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.to_ascii_lowercase())
                .and_then(|ext| backend::content_type(&ext))
                .unwrap_or("application/octet-stream");
            Some((bytes, content_type))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Fallback error image unreadable");
            None
        }
    }
}

/// Restrict a message to visible ASCII so it is a valid header value.
fn header_safe(message: &str) -> String {
    message
        .chars()
        .map(|c| if c == ' ' || c.is_ascii_graphic() { c } else { '?' })
        .collect()
}

fn rendered_response(rendered: Rendered, cache_max_age: u32) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, rendered.content_type.to_string()),
            (header::CACHE_CONTROL, format!("public, max-age={}", cache_max_age)),
            (
                header::HeaderName::from_static(CACHE_HEADER),
                rendered.cache.as_str().to_string(),
            ),
        ],
        rendered.body,
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle thumbnail requests.
///
/// # Response
///
/// - `200 OK`: the rendered image
/// - `302 Found`: the request is not canonical; `Location` holds the
///   canonical URL
/// - `4xx/5xx`: fallback image or JSON error, depending on the group's
///   debug level
///
/// # Headers
///
/// - `Content-Type`: from the requested extension
/// - `Cache-Control: public, max-age={cache_max_age}`
/// - `X-Thumb-Cache: hit|stored|bypass`
pub async fn thumb_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    // HTTP/2 carries the authority in the URI, HTTP/1.1 in the Host header
    let host = uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| headers.get(header::HOST).and_then(|h| h.to_str().ok()))
        .unwrap_or_default();

    // Detect protocol from X-Forwarded-Proto header (for reverse proxy support)
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("http");

    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let ctx = match RequestContext::from_parts(
        proto,
        host,
        path_and_query,
        state.script_name.as_deref(),
    ) {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };

    match state.process(ctx).await {
        Outcome::Serve(rendered) => rendered_response(rendered, state.cache_max_age),
        Outcome::Redirect(url) => (StatusCode::FOUND, [(header::LOCATION, url)]).into_response(),
        Outcome::Fail(failure) => failure_response(failure),
    }
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
