//! Request orchestration.
//!
//! [`Thumber::process`] turns one request into an [`Outcome`]:
//!
//! ```text
//! route ─► group ─► decode ─► resolve (pass 1) ─► canonical? ──no──► Redirect
//!                                                     │yes
//!                                   cache hit? ◄──────┘
//!                                     │no
//!            open source ─► resolve (pass 2) ─► canonical? ──no──► Redirect
//!                                                     │yes
//!                           stages ─► encode/optimize ─► cache write ─► Serve
//! ```
//!
//! Any error becomes [`Outcome::Fail`] carrying the presentation policy of
//! the group (or the store default when no group matched).

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::backend::{self, ImageBackend};
use crate::error::ThumbError;
use crate::params::{self, ParameterResolver};
use crate::route::{RequestContext, RoutePath};
use crate::settings::{GroupConfig, Settings};

use super::optimizer::{LosslessOptimizer, Pngout};
use super::stages::Stages;
use super::{cache, source, CacheStatus, Failure, Outcome, Rendered};

/// Extension whose output keeps every animation frame.
const ANIMATED_EXTENSION: &str = "gif";

/// Extension eligible for lossless optimization.
const OPTIMIZABLE_EXTENSION: &str = "png";

/// Thumbnail request processor shared by every request.
#[derive(Debug, Clone)]
pub struct Thumber {
    settings: Arc<Settings>,
}

impl Thumber {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process one request. Never panics; failures are folded into
    /// [`Outcome::Fail`].
    pub fn process(&self, ctx: RequestContext) -> Outcome {
        let route = RoutePath::new(ctx);

        let config = match self.group_for(&route) {
            Ok(config) => config,
            Err(error) => {
                let fallback = self.settings.fallback();
                return Outcome::Fail(Failure::new(
                    error,
                    fallback.debug,
                    fallback.error_url.clone(),
                ));
            }
        };

        match self.render(&route, &config) {
            Ok(outcome) => outcome,
            Err(error) => Outcome::Fail(Failure::new(
                error,
                config.debug,
                config.error_url.clone(),
            )),
        }
    }

    /// Canonical URL for a request without rendering it.
    ///
    /// When the source image exists its size is taken into account, so the
    /// result is the URL the server would finally serve.
    pub fn canonical_url(&self, ctx: RequestContext) -> Result<String, ThumbError> {
        let route = RoutePath::new(ctx);
        let config = self.group_for(&route)?;
        let decoded = self.decode(&route, &config)?;

        let mut resolver = ParameterResolver::new(&decoded, &config);
        let source = source::source_path(&route, &config)?;
        if source::check_source(&config.source_path, &source).is_ok() {
            let image = config.adapter.backend().open(&source)?;
            let (width, height) = image.size();
            resolver = resolver.with_image_size(width, height);
        }

        redirect_url(&route, &resolver.canonical_name())
    }

    fn group_for(&self, route: &RoutePath) -> Result<Arc<GroupConfig>, ThumbError> {
        let key = route.group_key();
        self.settings
            .group(key)
            .ok_or_else(|| ThumbError::GroupNotConfigured {
                key: key.to_string(),
            })
    }

    fn decode(
        &self,
        route: &RoutePath,
        config: &GroupConfig,
    ) -> Result<params::DecodedName, ThumbError> {
        let filename = route.transform_filename();
        if filename.is_empty() {
            return Err(ThumbError::InvalidRequest(
                "request path has no image filename".to_string(),
            ));
        }

        let decoded = params::decode(filename)?;
        if !backend::is_supported_extension(&decoded.extension) {
            return Err(ThumbError::InvalidRequest(format!(
                "unsupported image extension '{}'",
                decoded.extension
            )));
        }
        if !config.allows_extension(&decoded.extension) {
            return Err(ThumbError::InvalidRequest(format!(
                "extension '{}' not allowed for group '{}'",
                decoded.extension, config.key
            )));
        }
        Ok(decoded)
    }

    fn render(&self, route: &RoutePath, config: &GroupConfig) -> Result<Outcome, ThumbError> {
        let filename = route.transform_filename();
        let decoded = self.decode(route, config)?;
        let extension = decoded.extension.as_str();

        let resolver = ParameterResolver::new(&decoded, config);
        let canonical = resolver.canonical_name();
        if canonical != filename {
            return redirect(route, filename, &canonical);
        }

        let source = source::source_path(route, config)?;
        let content_type = backend::content_type(extension).unwrap_or("application/octet-stream");

        let cache_file = self.cache_file(route, config, filename);
        if let Some(path) = &cache_file {
            if let Some(bytes) = cache::read(path) {
                debug!(path = %path.display(), "Serving cached thumbnail");
                return Ok(Outcome::Serve(Rendered {
                    body: Bytes::from(bytes),
                    content_type,
                    cache: CacheStatus::Hit,
                }));
            }
        }

        source::check_source(&config.source_path, &source)?;
        let backend = config.adapter.backend();
        let mut image = backend.open(&source)?;
        let (width, height) = image.size();
        debug!(
            source = %source.display(),
            width,
            height,
            frames = image.frame_count(),
            adapter = backend.adapter().name(),
            "Opened source image"
        );

        let resolver = resolver.with_image_size(width, height);
        let canonical = resolver.canonical_name();
        if canonical != filename {
            return redirect(route, filename, &canonical);
        }

        let animated = extension == ANIMATED_EXTENSION;
        Stages::new(&backend, config, resolver.spec(), animated).run(&mut image)?;

        let encoded = image.encode(extension, resolver.output_quality())?;
        let optimized = if extension == OPTIMIZABLE_EXTENSION && config.png_optimize.enable {
            Pngout::new(config.png_optimize.pngout_bin.clone()).run(&encoded)
        } else {
            None
        };

        // The optimizer artifact is removed when `optimized` drops
        let body = match &optimized {
            Some(artifact) => std::fs::read(artifact)?,
            None => encoded,
        };

        let cache = match &cache_file {
            Some(path) => match cache::write(path, &body) {
                Ok(()) => {
                    info!(path = %path.display(), bytes = body.len(), "Cached thumbnail");
                    CacheStatus::Stored
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to cache thumbnail");
                    CacheStatus::Bypass
                }
            },
            None => CacheStatus::Bypass,
        };

        Ok(Outcome::Serve(Rendered {
            body: Bytes::from(body),
            content_type,
            cache,
        }))
    }

    fn cache_file(
        &self,
        route: &RoutePath,
        config: &GroupConfig,
        filename: &str,
    ) -> Option<PathBuf> {
        if !config.cache {
            return None;
        }
        let root = config.thumb_cache_path.as_deref()?;
        Some(cache::cache_path(
            root,
            &config.key,
            &route.source_sub_path(),
            filename,
        ))
    }
}

fn redirect(route: &RoutePath, from: &str, to: &str) -> Result<Outcome, ThumbError> {
    let url = redirect_url(route, to)?;
    info!(from, to, "Redirecting to canonical URL");
    Ok(Outcome::Redirect(url))
}

fn redirect_url(route: &RoutePath, filename: &str) -> Result<String, ThumbError> {
    let url = route.to_url(filename);
    if url.is_empty() {
        return Err(ThumbError::InvalidRequest(
            "cannot build a redirect URL without a host".to_string(),
        ));
    }
    Ok(url)
}
