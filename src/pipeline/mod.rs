//! Thumbnail pipeline.
//!
//! - [`orchestrator`]: request flow from route to [`Outcome`]
//! - [`stages`]: crop, resize, rotate, filter and watermark
//! - [`optimizer`]: external lossless PNG optimization
//! - [`cache`]: on-disk rendition cache
//! - [`source`]: source file location and encoding

pub mod cache;
pub mod optimizer;
pub mod orchestrator;
pub mod source;
pub mod stages;

pub use optimizer::{LosslessOptimizer, Pngout};
pub use orchestrator::Thumber;

use std::path::PathBuf;

use bytes::Bytes;

use crate::error::ThumbError;
use crate::settings::DebugLevel;

/// Result of processing one request.
#[derive(Debug)]
pub enum Outcome {
    /// Image bytes to return.
    Serve(Rendered),
    /// The request is not canonical; redirect to this absolute URL.
    Redirect(String),
    /// Processing failed.
    Fail(Failure),
}

/// Rendered (or cached) image.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub body: Bytes,
    pub content_type: &'static str,
    pub cache: CacheStatus,
}

/// How the disk cache took part in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the cache without rendering.
    Hit,
    /// Rendered and written to the cache.
    Stored,
    /// Rendered without touching the cache.
    Bypass,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "hit",
            CacheStatus::Stored => "stored",
            CacheStatus::Bypass => "bypass",
        }
    }
}

/// A failed request with the presentation policy that applies to it.
#[derive(Debug, Clone)]
pub struct Failure {
    pub error: ThumbError,
    pub debug: DebugLevel,
    /// Fallback image served at the non-raising debug levels.
    pub error_url: Option<PathBuf>,
}

impl Failure {
    pub fn new(error: ThumbError, debug: DebugLevel, error_url: Option<PathBuf>) -> Self {
        Self {
            error,
            debug,
            error_url,
        }
    }
}
