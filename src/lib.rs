//! # urlthumb
//!
//! An on-demand image thumbnail server whose transform parameters live in
//! the requested URL.
//!
//! A request such as `/thumb/d/photo,c_fill,h_100,w_100.jpg` names a group
//! (`d`), a source file (`photo.jpg` under the group's source directory) and a
//! set of `key_value` tokens describing the thumbnail. Every request is first
//! reduced to its canonical URL; non-canonical requests are redirected so that
//! each distinct thumbnail has exactly one address and one cache entry.
//!
//! ## Features
//!
//! - **URL-encoded transforms**: crop, resize, rotate, filters, quality and
//!   watermarking from a single filename
//! - **Canonical redirects**: parameters are clamped to group limits and
//!   serialized in a fixed order
//! - **Disk cache**: rendered thumbnails are stored under the canonical path
//! - **Animated GIF**: frames are coalesced, decimated and transformed together
//! - **Per-group policy**: allowed sizes and extensions, disabled operations,
//!   error presentation
//!
//! ## Architecture
//!
//! - [`settings`] - TOML group configuration
//! - [`route`] - request URL decomposition
//! - [`params`] - transform tokens, canonicalization and clamping
//! - [`backend`] - raster engine, effects and text rendering
//! - [`pipeline`] - orchestration, stages, cache and PNG optimization
//! - [`server`] - Axum HTTP layer
//! - [`config`] - CLI types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use urlthumb::{create_router, RouterConfig, Settings, Thumber};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load("urlthumb.toml")?;
//!     let router = create_router(Thumber::new(Arc::new(settings)), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod params;
pub mod pipeline;
pub mod route;
pub mod server;
pub mod settings;

// Re-export commonly used types
pub use backend::{Adapter, ImageBackend, RasterBackend};
pub use config::{CanonicalConfig, CheckConfig, Cli, Command, ServeConfig};
pub use error::{BackendError, ConfigError, ThumbError};
pub use params::{ParameterResolver, TransformSpec};
pub use pipeline::{CacheStatus, Failure, Outcome, Rendered, Thumber};
pub use route::{RequestContext, RoutePath};
pub use server::{create_router, AppState, RouterConfig};
pub use settings::{DebugLevel, GroupConfig, Settings};
