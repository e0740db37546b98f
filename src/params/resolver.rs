//! Parameter resolution against group configuration.
//!
//! Resolution runs in two passes. The first pass only knows the request and
//! the group's configured bounds; the second pass also knows the intrinsic
//! size of the source image and may tighten the bounds further. Each pass ends
//! with a full normalization, after which [`ParameterResolver::canonical_name`]
//! yields the unique filename for the resolved parameters.
//!
//! ```text
//! DecodedName ──► setters ──► normalize ──► canonical_name   (pass 1)
//!                                 │
//!                   with_image_size(w, h)
//!                                 ▼
//!                             normalize ──► canonical_name   (pass 2)
//! ```

use tracing::debug;

use crate::settings::GroupConfig;

use super::codec::{self, DecodedName};
use super::spec::{
    parse_crop, parse_dimension, parse_filter, parse_gravity, parse_number, parse_offset, Crop,
    Field, Gravity, TransformSpec,
};

/// Extensions for which a quality token is meaningful.
const QUALITY_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// Effective output bounds after normalization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Bounds {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Resolves decoded tokens into a normalized [`TransformSpec`].
#[derive(Debug, Clone)]
pub struct ParameterResolver<'a> {
    config: &'a GroupConfig,
    basename: String,
    extension: String,
    spec: TransformSpec,
    bounds: Bounds,
    image_size: Option<(u32, u32)>,
}

impl<'a> ParameterResolver<'a> {
    /// Run the first resolution pass over the decoded filename.
    pub fn new(decoded: &DecodedName, config: &'a GroupConfig) -> Self {
        let mut resolver = Self {
            config,
            basename: decoded.basename.clone(),
            extension: decoded.extension.clone(),
            spec: TransformSpec::default(),
            bounds: Bounds::default(),
            image_size: None,
        };

        for token in &decoded.tokens {
            resolver.set(token.field, &token.value);
        }
        resolver.normalize();
        resolver
    }

    /// Run the second resolution pass with the source image's intrinsic size.
    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_size = Some((width, height));
        self.normalize();
        self
    }

    /// The resolved transform parameters.
    pub fn spec(&self) -> &TransformSpec {
        &self.spec
    }

    /// Effective output bounds from the last normalization.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Quality to encode with: the requested value or the group default.
    pub fn output_quality(&self) -> u8 {
        self.spec.quality.unwrap_or(self.config.quality)
    }

    /// The canonical filename for the resolved parameters.
    pub fn canonical_name(&self) -> String {
        let pairs: Vec<(Field, String)> = Field::ALL
            .into_iter()
            .filter_map(|field| self.spec.value(field).map(|value| (field, value)))
            .collect();
        codec::encode(&self.basename, &self.extension, &pairs)
    }

    // =========================================================================
    // Field setters
    // =========================================================================

    fn set(&mut self, field: Field, raw: &str) {
        let spec = &mut self.spec;
        match field {
            Field::Border => spec.border = Some(raw.to_string()),
            Field::Layer => spec.layer = Some(raw.to_string()),
            Field::Crop => spec.crop = parse_crop(raw),
            Field::Filter => spec.filter = parse_filter(raw),
            Field::Gravity => spec.gravity = parse_gravity(raw),
            Field::Height => spec.height = parse_dimension(raw),
            Field::Width => {
                let mut width = parse_dimension(raw);
                if !self.config.allow_stretch {
                    if let (Some(w), Some(max)) = (width, self.bounds.width) {
                        width = Some(w.min(max));
                    }
                }
                spec.width = width;
            }
            Field::Percent => {
                spec.percent = parse_number(raw).map(|p| p.clamp(1, 100) as u8);
            }
            Field::Quality => {
                spec.quality = if QUALITY_EXTENSIONS.contains(&self.extension.as_str()) {
                    parse_number(raw)
                        .filter(|q| *q > 0)
                        .map(|q| q.min(100) as u8)
                } else {
                    None
                };
            }
            Field::Rotate => {
                spec.rotate = parse_number(raw).map(|r| r.rem_euclid(360) as u16);
            }
            Field::X => spec.x = parse_offset(raw),
            Field::Y => spec.y = parse_offset(raw),
        }
    }

    // =========================================================================
    // Normalization
    // =========================================================================

    fn normalize(&mut self) {
        let config = self.config;
        let spec = &mut self.spec;

        // Effective bounds: configured max, narrowed by the intrinsic size
        // when stretching is disallowed.
        let mut bounds = Bounds {
            width: config.max_width,
            height: config.max_height,
        };
        if let Some((image_width, image_height)) = self.image_size {
            bounds.width = effective_max(config.max_width, image_width, config.allow_stretch);
            bounds.height = effective_max(config.max_height, image_height, config.allow_stretch);
        }
        self.bounds = bounds;

        if let (Some(w), Some(max)) = (spec.width, bounds.width) {
            spec.width = Some(w.min(max));
        }
        if let (Some(h), Some(max)) = (spec.height, bounds.height) {
            spec.height = Some(h.min(max));
        }

        // Percent scaling and fixed-box resizing are exclusive
        if spec.percent.is_some() {
            spec.width = None;
            spec.height = None;
        }

        if !config.allow_sizes.is_empty() {
            let matched = match (spec.width, spec.height) {
                (Some(w), Some(h)) => config.allow_sizes.contains(&(w, h)),
                _ => false,
            };
            if !matched && (spec.width.is_some() || spec.height.is_some()) {
                debug!(
                    group = %config.key,
                    width = ?spec.width,
                    height = ?spec.height,
                    "Output size not in allow list, clearing"
                );
                spec.width = None;
                spec.height = None;
            }
        }

        for field in Field::ALL {
            if config.is_disabled(field) {
                spec.clear(field);
            }
        }

        // Offsets only apply to an explicit crop box, and only as a pair
        if spec.crop_size().is_none() || spec.x.is_none() || spec.y.is_none() {
            spec.x = None;
            spec.y = None;
        }

        if spec.crop == Some(Crop::Fill) {
            if matches!(spec.gravity, Some(Gravity::Height(_))) {
                spec.gravity = None;
            }
            // Fill needs an explicit box; without one it is the default crop
            if spec.width.is_none() || spec.height.is_none() {
                spec.crop = None;
            }
        }

        // Values equal to their defaults are omitted from the canonical form
        if spec.percent == Some(100) {
            spec.percent = None;
        }
        if spec.quality == Some(config.quality) {
            spec.quality = None;
        }
        if spec.rotate == Some(0) {
            spec.rotate = None;
        }
    }
}

/// Effective max for one axis given the intrinsic size.
fn effective_max(configured: Option<u32>, intrinsic: u32, allow_stretch: bool) -> Option<u32> {
    match configured {
        Some(max) if max < intrinsic => Some(max),
        _ if allow_stretch => configured,
        _ => Some(intrinsic),
    }
}

// =============================================================================
// Tests
// =============================================================================
