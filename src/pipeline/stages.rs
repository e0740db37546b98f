//! Transform stages.
//!
//! Stages run in a fixed order over a decoded [`Image`]:
//!
//! ```text
//! crop ─► resize ─► rotate ─► filter ─► watermark
//! ```
//!
//! Quality and PNG optimization are output options handled by the
//! orchestrator. Geometry is computed by the pure helpers at the bottom of
//! this file so it can be tested without pixels.

use tracing::debug;

use crate::backend::{Image, ImageBackend, ThumbnailMode};
use crate::error::ThumbError;
use crate::params::{Crop, Filter, Gravity, TransformSpec};
use crate::settings::{GroupConfig, Position};

/// Exponent applied by the `gamma` filter.
pub const GAMMA_CORRECTION: f32 = 0.7;

/// Block size of the mosaic used by `carve`.
pub const CARVE_MOSAIC_BLOCK: u32 = 8;

/// Blur radius used by `softenface`.
pub const SOFTEN_BLUR_SIGMA: f32 = 1.0;

/// Brightness shift applied after `softenface` (percent).
pub const SOFTEN_BRIGHTNESS: i32 = -10;

/// Animated images with more frames than this are decimated.
pub const FRAME_DECIMATION_THRESHOLD: usize = 10;

/// Stage runner bound to one request.
pub struct Stages<'a> {
    backend: &'a dyn ImageBackend,
    config: &'a GroupConfig,
    spec: &'a TransformSpec,
    animated: bool,
}

impl<'a> Stages<'a> {
    /// `animated` selects per-frame handling (GIF output).
    pub fn new(
        backend: &'a dyn ImageBackend,
        config: &'a GroupConfig,
        spec: &'a TransformSpec,
        animated: bool,
    ) -> Self {
        Self {
            backend,
            config,
            spec,
            animated,
        }
    }

    /// Run every pixel stage in order.
    pub fn run(&self, image: &mut Image) -> Result<(), ThumbError> {
        self.crop(image)?;
        self.resize(image)?;
        self.rotate(image);
        self.filter(image);
        self.watermark(image)?;
        Ok(())
    }

    // =========================================================================
    // Crop
    // =========================================================================

    /// Numeric crop box. `fill` is handled by resize.
    pub fn crop(&self, image: &mut Image) -> Result<(), ThumbError> {
        let Some(Crop::Size(size)) = self.spec.crop else {
            return Ok(());
        };

        let rect = crop_box(image.size(), size, self.spec.gravity, self.spec.x, self.spec.y);
        debug!(
            x = rect.x,
            y = rect.y,
            width = rect.width,
            height = rect.height,
            "Cropping"
        );

        if self.animated {
            image.coalesce();
            let dropped = frames_to_drop(image.frame_count());
            if !dropped.is_empty() {
                debug!(
                    frames = image.frame_count(),
                    dropped = dropped.len(),
                    "Decimating animation"
                );
                image.remove_frames(&dropped);
            }
        }
        image.crop(rect.x, rect.y, rect.width, rect.height)?;
        Ok(())
    }

    // =========================================================================
    // Resize
    // =========================================================================

    pub fn resize(&self, image: &mut Image) -> Result<(), ThumbError> {
        if let Some(percent) = self.spec.percent {
            if percent == 100 {
                return Ok(());
            }
            let (width, height) = percent_target(image.size(), percent);
            debug!(percent, width, height, "Scaling by percent");
            image.thumbnail(width, height, ThumbnailMode::Outbound)?;
            return Ok(());
        }

        let target = resize_target(
            self.spec.width,
            self.spec.height,
            self.config.max_width,
            self.config.max_height,
            image.size(),
            self.config.allow_stretch,
        );
        let Some((width, height)) = target else {
            return Ok(());
        };

        if self.animated {
            let (image_w, image_h) = image.size();
            image.coalesce();
            let x = (image_w as i64 - width as i64) / 2;
            let y = (image_h as i64 - height as i64) / 2;
            debug!(width, height, "Cropping animation frames to box");
            image.crop(x, y, width, height)?;
            return Ok(());
        }

        let mode = if self.spec.is_fill() {
            ThumbnailMode::Outbound
        } else {
            ThumbnailMode::Inset
        };
        debug!(width, height, ?mode, "Resizing");
        image.thumbnail(width, height, mode)?;
        Ok(())
    }

    pub fn rotate(&self, image: &mut Image) {
        if let Some(degrees) = self.spec.rotate.filter(|d| *d != 0) {
            debug!(degrees, "Rotating");
            image.rotate(degrees);
        }
    }

    // =========================================================================
    // Filter
    // =========================================================================

    pub fn filter(&self, image: &mut Image) {
        let Some(filter) = self.spec.filter else {
            return;
        };
        debug!(filter = filter.name(), "Applying filter");

        match filter {
            Filter::Gray => {
                image.effects().grayscale();
            }
            Filter::Gamma => {
                image.effects().gamma(GAMMA_CORRECTION);
            }
            Filter::Negative => {
                image.effects().negative();
            }
            Filter::Sharp => {
                image.effects().sharpen();
            }
            Filter::Carve => {
                let mut layer = image.copy();
                layer
                    .effects()
                    .mosaic(CARVE_MOSAIC_BLOCK)
                    .borderline()
                    .emboss();
                image.paste(&layer, 0, 0);
            }
            Filter::SoftenFace => {
                let mut layer = image.copy();
                layer.effects().blur(SOFTEN_BLUR_SIGMA);
                image.paste(&layer, 0, 0);
                image.effects().brightness(SOFTEN_BRIGHTNESS);
            }
            Filter::Lomo => {}
        }
    }

    // =========================================================================
    // Watermark
    // =========================================================================

    /// Image layer when configured, otherwise text when fully configured.
    pub fn watermark(&self, image: &mut Image) -> Result<(), ThumbError> {
        let watermark = &self.config.watermark;
        if !watermark.enable {
            return Ok(());
        }

        let layer = if let Some(layer_file) = &watermark.layer_file {
            self.backend.open(layer_file)?.first_frame().clone()
        } else if let Some(text) = watermark.text_layer() {
            let font = self
                .backend
                .load_font(text.font_file, text.font_size, text.font_color)?;
            font.render(text.text)?
        } else {
            debug!(group = %self.config.key, "Watermark enabled without a layer or text, skipping");
            return Ok(());
        };

        let (x, y) = watermark_point(watermark.position, image.size(), layer.dimensions());
        debug!(x, y, position = ?watermark.position, "Applying watermark");
        image.paste_buffer(&layer, x, y);
        Ok(())
    }
}

// =============================================================================
// Geometry
// =============================================================================

/// Crop rectangle in source pixels. Offsets may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Box for a numeric crop of `size` on an image of `image` size.
///
/// The height is the numeric gravity when present, else `size`. Both sides
/// are clamped to the image. Without explicit offsets the box is centred, or
/// pinned to the edge a directional gravity names. Explicit offsets are
/// clamped so the box stays inside the image.
pub fn crop_box(
    image: (u32, u32),
    size: u32,
    gravity: Option<Gravity>,
    x: Option<i64>,
    y: Option<i64>,
) -> CropBox {
    let (image_w, image_h) = image;
    let height = match gravity {
        Some(Gravity::Height(h)) => h,
        _ => size,
    };
    let width = size.min(image_w);
    let height = height.min(image_h);

    let free_x = (image_w - width) as i64;
    let free_y = (image_h - height) as i64;
    let default_x = match gravity {
        Some(Gravity::Left) => 0,
        Some(Gravity::Right) => free_x,
        _ => free_x / 2,
    };
    let default_y = match gravity {
        Some(Gravity::Top) => 0,
        Some(Gravity::Bottom) => free_y,
        _ => free_y / 2,
    };

    CropBox {
        x: x.map_or(default_x, |x| x.clamp(0, free_x)),
        y: y.map_or(default_y, |y| y.clamp(0, free_y)),
        width,
        height,
    }
}

/// Frame indices to remove from an animation of `count` frames.
///
/// Above the threshold, `floor(count * 0.3)` indices are spread evenly,
/// starting after the first frame.
pub fn frames_to_drop(count: usize) -> Vec<usize> {
    if count <= FRAME_DECIMATION_THRESHOLD {
        return Vec::new();
    }
    let drop = count * 3 / 10;
    (0..drop).map(|i| i * count / drop + 1).collect()
}

/// Output size for percent scaling.
pub fn percent_target(image: (u32, u32), percent: u8) -> (u32, u32) {
    let scale = |side: u32| ((side as f64 * percent as f64 / 100.0).round() as u32).max(1);
    (scale(image.0), scale(image.1))
}

/// Target box for size-mode resizing, or `None` when no resize is needed.
///
/// Without a requested size the image only shrinks to the configured max.
/// With one requested side the other follows the aspect ratio (rounded up).
/// Without stretching the box never exceeds the max or the image itself.
pub fn resize_target(
    width: Option<u32>,
    height: Option<u32>,
    max_width: Option<u32>,
    max_height: Option<u32>,
    image: (u32, u32),
    allow_stretch: bool,
) -> Option<(u32, u32)> {
    let (image_w, image_h) = image;

    let (width, height) = if width.is_none() && height.is_none() {
        let over_w = max_width.filter(|max| image_w > *max);
        let over_h = max_height.filter(|max| image_h > *max);
        if over_w.is_none() && over_h.is_none() {
            return None;
        }
        complete_box(over_w, over_h, image)
    } else {
        let (mut w, mut h) = complete_box(width, height, image);
        if !allow_stretch {
            if let Some(max) = max_width {
                w = w.min(max);
            }
            if let Some(max) = max_height {
                h = h.min(max);
            }
            w = w.min(image_w);
            h = h.min(image_h);
        }
        (w, h)
    };

    if (width, height) == image {
        return None;
    }
    Some((width.max(1), height.max(1)))
}

/// Fill in a missing side from the image aspect ratio.
fn complete_box(width: Option<u32>, height: Option<u32>, image: (u32, u32)) -> (u32, u32) {
    let (image_w, image_h) = (image.0 as u64, image.1 as u64);
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, div_ceil(w as u64 * image_h, image_w)),
        (None, Some(h)) => (div_ceil(h as u64 * image_w, image_h), h),
        (None, None) => image,
    }
}

fn div_ceil(numerator: u64, denominator: u64) -> u32 {
    numerator.div_ceil(denominator.max(1)) as u32
}

/// Top-left paste point for a watermark layer.
pub fn watermark_point(position: Position, image: (u32, u32), layer: (u32, u32)) -> (i64, i64) {
    let far_x = image.0 as i64 - layer.0 as i64;
    let far_y = image.1 as i64 - layer.1 as i64;
    match position {
        Position::TopLeft => (0, 0),
        Position::TopRight => (far_x, 0),
        Position::BottomLeft => (0, far_y),
        Position::Center => (far_x / 2, far_y / 2),
        Position::BottomRight => (far_x, far_y),
    }
}
