//! Router configuration for the thumbnail server.
//!
//! This module defines the HTTP routes and applies middleware for CORS and
//! request tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                                               - Health check
//! /{prefix}/{group}/{sub/path...}/{name}[,k_v]*.{ext}   - Thumbnail (fallback)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use urlthumb::server::routes::{create_router, RouterConfig};
//! use urlthumb::{Settings, Thumber};
//!
//! let settings = Settings::load("urlthumb.toml")?;
//! let thumber = Thumber::new(Arc::new(settings));
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://example.com".to_string()])
//!     .with_max_concurrent_transforms(4);
//!
//! let router = create_router(thumber, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, thumb_handler, AppState, DEFAULT_CACHE_MAX_AGE,
    DEFAULT_MAX_CONCURRENT_TRANSFORMS,
};
use crate::pipeline::Thumber;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Cache-Control max-age in seconds
    pub cache_max_age: u32,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Maximum number of transforms running at once
    pub max_concurrent_transforms: usize,

    /// Script name used when requests go through a front script
    pub script_name: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a new router configuration.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Cache max-age is 1 hour (3600 seconds)
    /// - Tracing is enabled
    /// - Eight transforms may run at once
    pub fn new() -> Self {
        Self {
            cors_origins: None, // Allow any origin by default
            cache_max_age: DEFAULT_CACHE_MAX_AGE,
            enable_tracing: true,
            max_concurrent_transforms: DEFAULT_MAX_CONCURRENT_TRANSFORMS,
            script_name: None,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    /// Set the Cache-Control max-age in seconds.
    pub fn with_cache_max_age(mut self, seconds: u32) -> Self {
        self.cache_max_age = seconds;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Bound the number of transforms running on the blocking pool.
    pub fn with_max_concurrent_transforms(mut self, permits: usize) -> Self {
        self.max_concurrent_transforms = permits;
        self
    }

    /// Set the front script name (e.g. `/index.php`).
    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = Some(script_name.into());
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - The health check route
/// - The thumbnail fallback handler
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router(thumber: Thumber, config: RouterConfig) -> Router {
    let app_state = AppState::new(thumber)
        .with_cache_max_age(config.cache_max_age)
        .with_max_concurrent_transforms(config.max_concurrent_transforms)
        .with_script_name(config.script_name.clone());

    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/health", get(health_handler))
        .fallback(thumb_handler)
        .with_state(app_state)
        .layer(cors);

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => {
            // No origins allowed - this effectively disables CORS
            cors
        }
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
