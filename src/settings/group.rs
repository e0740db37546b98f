//! Typed per-group configuration.

use std::path::PathBuf;

use tracing::warn;

use crate::backend::Adapter;
use crate::error::ConfigError;
use crate::params::Field;

use super::tree::ConfigTree;

/// Default output quality when a group does not configure one.
pub const DEFAULT_QUALITY: u8 = 100;

/// Default source filesystem encoding.
pub const DEFAULT_FILE_ENCODING: &str = "UTF-8";

// =============================================================================
// Debug Level
// =============================================================================

/// How request failures are presented to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DebugLevel {
    /// Serve the fallback error image.
    #[default]
    Silent,
    /// Serve the fallback error image and expose the message in a header.
    Header,
    /// Return the error itself as a JSON body.
    Raise,
}

impl DebugLevel {
    fn from_int(value: i64) -> Option<Self> {
        match value {
            0 => Some(DebugLevel::Silent),
            1 => Some(DebugLevel::Header),
            2 => Some(DebugLevel::Raise),
            _ => None,
        }
    }

    /// Read the `debug` key of `tree`; `key` names it in errors.
    pub(crate) fn from_tree(tree: &ConfigTree, key: &str) -> Result<Self, ConfigError> {
        match tree.get_int("debug")? {
            None => Ok(DebugLevel::default()),
            Some(level) => DebugLevel::from_int(level).ok_or_else(|| ConfigError::Invalid {
                key: key.to_string(),
                message: format!("expected 0, 1 or 2, got {}", level),
            }),
        }
    }
}

// =============================================================================
// Watermark
// =============================================================================

/// Corner or center anchor for the watermark layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Position {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl Position {
    /// Parse a position name. Unknown names fall back to bottom-right.
    pub fn parse(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "tl" => Position::TopLeft,
            "tr" => Position::TopRight,
            "bl" => Position::BottomLeft,
            "center" => Position::Center,
            _ => Position::BottomRight,
        }
    }
}

/// Watermark settings for a group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatermarkConfig {
    pub enable: bool,
    pub position: Position,
    pub text: Option<String>,
    pub layer_file: Option<PathBuf>,
    pub font_file: Option<PathBuf>,
    pub font_size: Option<f32>,
    pub font_color: Option<String>,
}

/// Text watermark parameters, present only when every piece is configured.
#[derive(Debug, Clone, Copy)]
pub struct TextWatermark<'a> {
    pub text: &'a str,
    pub font_file: &'a std::path::Path,
    pub font_size: f32,
    pub font_color: &'a str,
}

impl WatermarkConfig {
    fn from_tree(tree: Option<&ConfigTree>) -> Result<Self, ConfigError> {
        let Some(tree) = tree else {
            return Ok(Self::default());
        };

        Ok(Self {
            enable: tree.get_bool("enable")?.unwrap_or(false),
            position: tree
                .get_str("position")?
                .map(Position::parse)
                .unwrap_or_default(),
            text: non_empty(tree.get_str("text")?),
            layer_file: non_empty(tree.get_str("layer_file")?).map(PathBuf::from),
            font_file: non_empty(tree.get_str("font_file")?).map(PathBuf::from),
            font_size: tree
                .get_float("font_size")?
                .filter(|size| *size > 0.0)
                .map(|size| size as f32),
            font_color: non_empty(tree.get_str("font_color")?),
        })
    }

    /// Returns the text watermark parameters if all of them are set.
    pub fn text_layer(&self) -> Option<TextWatermark<'_>> {
        Some(TextWatermark {
            text: self.text.as_deref()?,
            font_file: self.font_file.as_deref()?,
            font_size: self.font_size?,
            font_color: self.font_color.as_deref()?,
        })
    }
}

// =============================================================================
// PNG Optimize
// =============================================================================

/// Lossless PNG optimization settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PngOptimizeConfig {
    pub enable: bool,
    /// Optimizer tool name. Only `pngout` is known.
    pub adapter: String,
    /// Path to the `pngout` executable.
    pub pngout_bin: Option<PathBuf>,
}

impl Default for PngOptimizeConfig {
    fn default() -> Self {
        Self {
            enable: false,
            adapter: "pngout".to_string(),
            pngout_bin: None,
        }
    }
}

impl PngOptimizeConfig {
    fn from_tree(tree: Option<&ConfigTree>) -> Result<Self, ConfigError> {
        let Some(tree) = tree else {
            return Ok(Self::default());
        };

        let adapter = tree
            .get_str("adapter")?
            .unwrap_or("pngout")
            .to_ascii_lowercase();
        if adapter != "pngout" {
            return Err(ConfigError::Invalid {
                key: "png_optimize.adapter".to_string(),
                message: format!("unknown optimizer '{}'", adapter),
            });
        }

        Ok(Self {
            enable: tree.get_bool("enable")?.unwrap_or(false),
            pngout_bin: non_empty(tree.get_str("pngout.bin")?).map(PathBuf::from),
            adapter,
        })
    }
}

// =============================================================================
// Group Configuration
// =============================================================================

/// Resolved settings for one thumbnail group.
///
/// Built once at startup from the merged configuration tree and shared
/// read-only by every request addressed to the group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupConfig {
    /// Group key as it appears in request paths
    pub key: String,

    pub debug: DebugLevel,

    /// Root directory holding source images
    pub source_path: PathBuf,

    /// Encoding of filenames on the source filesystem
    pub system_file_encoding: String,

    /// Root directory for cached thumbnails
    pub thumb_cache_path: Option<PathBuf>,

    /// Image served in place of a failed thumbnail
    pub error_url: Option<PathBuf>,

    pub adapter: Adapter,

    /// Whether rendered thumbnails are written to the cache
    pub cache: bool,

    /// Whether output may exceed the source dimensions (never the max bounds)
    pub allow_stretch: bool,

    pub max_width: Option<u32>,
    pub max_height: Option<u32>,

    /// Default output quality
    pub quality: u8,

    /// Permitted output extensions (empty = any)
    pub allow_extensions: Vec<String>,

    /// Permitted (width, height) output boxes (empty = any)
    pub allow_sizes: Vec<(u32, u32)>,

    /// Transform fields forced off for this group
    pub disable_operates: Vec<Field>,

    pub watermark: WatermarkConfig,
    pub png_optimize: PngOptimizeConfig,
}

impl GroupConfig {
    /// Build a group from its (already merged) configuration tree.
    pub fn from_tree(key: &str, tree: &ConfigTree) -> Result<Self, ConfigError> {
        let source_path = tree
            .get_str("source_path")?
            .ok_or_else(|| ConfigError::Missing(format!("thumbers.{}.source_path", key)))?;

        let system_file_encoding = tree
            .get_str("system_file_encoding")?
            .unwrap_or(DEFAULT_FILE_ENCODING)
            .to_string();
        if encoding_rs::Encoding::for_label(system_file_encoding.as_bytes()).is_none() {
            return Err(ConfigError::Invalid {
                key: format!("thumbers.{}.system_file_encoding", key),
                message: format!("unknown encoding '{}'", system_file_encoding),
            });
        }

        let debug = DebugLevel::from_tree(tree, &format!("thumbers.{}.debug", key))?;

        let adapter = match tree.get_str("adapter")? {
            None => Adapter::default(),
            Some(name) => Adapter::parse(name).ok_or_else(|| ConfigError::Invalid {
                key: format!("thumbers.{}.adapter", key),
                message: format!("unknown adapter '{}' (expected GD, Imagick or Gmagick)", name),
            })?,
        };

        let quality = match tree.get_int("quality")? {
            None => DEFAULT_QUALITY,
            Some(q) if (1..=100).contains(&q) => q as u8,
            Some(q) => {
                return Err(ConfigError::Invalid {
                    key: format!("thumbers.{}.quality", key),
                    message: format!("must be between 1 and 100, got {}", q),
                })
            }
        };

        let group = Self {
            key: key.to_string(),
            debug,
            source_path: PathBuf::from(source_path),
            system_file_encoding,
            thumb_cache_path: non_empty(tree.get_str("thumb_cache_path")?).map(PathBuf::from),
            error_url: non_empty(tree.get_str("error_url")?).map(PathBuf::from),
            adapter,
            cache: tree.get_bool("cache")?.unwrap_or(false),
            allow_stretch: tree.get_bool("allow_stretch")?.unwrap_or(true),
            max_width: positive_dimension(tree.get_int("max_width")?),
            max_height: positive_dimension(tree.get_int("max_height")?),
            quality,
            allow_extensions: tree
                .get_str_list("allow_extensions")?
                .unwrap_or_default()
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            allow_sizes: parse_allow_sizes(key, tree.get_str_list("allow_sizes")?)?,
            disable_operates: parse_disabled(key, tree.get_str_list("disable_operates")?),
            watermark: WatermarkConfig::from_tree(tree.get_group("watermark")?)?,
            png_optimize: PngOptimizeConfig::from_tree(tree.get_group("png_optimize")?)?,
        };

        if group.cache && group.thumb_cache_path.is_none() {
            return Err(ConfigError::Missing(format!(
                "thumbers.{}.thumb_cache_path (required when cache is enabled)",
                key
            )));
        }

        Ok(group)
    }

    /// Returns true if the field is disabled for this group.
    pub fn is_disabled(&self, field: Field) -> bool {
        self.disable_operates.contains(&field)
    }

    /// Returns true if the output extension is permitted.
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allow_extensions.is_empty()
            || self
                .allow_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(extension))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

fn positive_dimension(value: Option<i64>) -> Option<u32> {
    value
        .filter(|v| *v > 0)
        .map(|v| v.min(u32::MAX as i64) as u32)
}

/// Parse `"W*H"` entries. Malformed entries are configuration errors.
fn parse_allow_sizes(key: &str, sizes: Option<Vec<String>>) -> Result<Vec<(u32, u32)>, ConfigError> {
    sizes
        .unwrap_or_default()
        .iter()
        .map(|entry| {
            let parsed = entry.split_once('*').and_then(|(w, h)| {
                let w: u32 = w.trim().parse().ok()?;
                let h: u32 = h.trim().parse().ok()?;
                (w > 0 && h > 0).then_some((w, h))
            });
            parsed.ok_or_else(|| ConfigError::Invalid {
                key: format!("thumbers.{}.allow_sizes", key),
                message: format!("'{}' is not of the form WIDTH*HEIGHT", entry),
            })
        })
        .collect()
}

fn parse_disabled(key: &str, names: Option<Vec<String>>) -> Vec<Field> {
    names
        .unwrap_or_default()
        .iter()
        .filter_map(|name| {
            let field = Field::from_name(name);
            if field.is_none() {
                warn!(group = key, operation = %name, "Ignoring unknown disabled operation");
            }
            field
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
