//! Image backends.
//!
//! A backend opens source files into an in-memory [`Image`] (a list of RGBA
//! frames) and loads fonts for text watermarks. All pixel operations the
//! pipeline needs live on [`Image`] itself, so every backend produces
//! byte-identical output for the same input.
//!
//! ```text
//! ┌──────────────┐  open()   ┌─────────┐  crop/thumbnail/rotate  ┌─────────┐
//! │ source file  │ ────────► │  Image  │ ──────────────────────► │ encode  │
//! └──────────────┘           └─────────┘   effects()/paste()     └─────────┘
//! ```
//!
//! The adapter names mirror the engine names accepted in group configuration
//! (`gd`, `imagick`, `gmagick`). They select the same raster engine.

mod effects;
mod raster;
mod text;

use std::path::Path;

use crate::error::BackendError;

pub use effects::Effects;
pub use raster::{Frame, Image, ThumbnailMode};
pub use text::{parse_hex_color, Font};

// =============================================================================
// Formats
// =============================================================================

/// Output extensions the raster engine can encode.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Whether `extension` (lowercase, no dot) can be produced.
pub fn is_supported_extension(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension)
}

/// MIME type for an output extension.
pub fn content_type(extension: &str) -> Option<&'static str> {
    match extension {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

// =============================================================================
// Adapter
// =============================================================================

/// Named image engine selected per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Adapter {
    #[default]
    Gd,
    Imagick,
    Gmagick,
}

impl Adapter {
    /// Parse a configured adapter name (case-insensitive).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gd" => Some(Adapter::Gd),
            "imagick" => Some(Adapter::Imagick),
            "gmagick" => Some(Adapter::Gmagick),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Adapter::Gd => "gd",
            Adapter::Imagick => "imagick",
            Adapter::Gmagick => "gmagick",
        }
    }

    /// Backend instance for this adapter.
    pub fn backend(self) -> RasterBackend {
        RasterBackend::new(self)
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// Source image loader and font provider.
pub trait ImageBackend: Send + Sync {
    /// Adapter this backend was created for.
    fn adapter(&self) -> Adapter;

    /// Decode a source file. Animated GIFs keep every frame.
    fn open(&self, path: &Path) -> Result<Image, BackendError>;

    /// Load a TrueType/OpenType font for text rendering.
    fn load_font(&self, path: &Path, size: f32, color: &str) -> Result<Font, BackendError>;
}

/// Pure-Rust raster engine built on the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterBackend {
    adapter: Adapter,
}

impl RasterBackend {
    pub fn new(adapter: Adapter) -> Self {
        Self { adapter }
    }
}

impl ImageBackend for RasterBackend {
    fn adapter(&self) -> Adapter {
        self.adapter
    }

    fn open(&self, path: &Path) -> Result<Image, BackendError> {
        Image::open(path)
    }

    fn load_font(&self, path: &Path, size: f32, color: &str) -> Result<Font, BackendError> {
        Font::load(path, size, parse_hex_color(color)?)
    }
}
