//! HTTP server layer for urlthumb.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /{prefix}/{group}/{sub/path...}/{name},k_v.{ext}        │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │           routes            │  │
//! │  │ (requests, error pages)  │  │  (router, CORS, tracing)    │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//!                    pipeline::Thumber (blocking pool)
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    health_handler, thumb_handler, AppState, ErrorResponse, HealthResponse, CACHE_HEADER,
    DEFAULT_CACHE_MAX_AGE, DEFAULT_MAX_CONCURRENT_TRANSFORMS, ERROR_HEADER,
};
pub use routes::{create_router, RouterConfig};
