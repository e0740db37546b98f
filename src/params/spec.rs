//! Typed transform fields.

use std::fmt;

// =============================================================================
// Field identifiers
// =============================================================================

/// A transform field addressable by a single-letter token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Border,
    Crop,
    Filter,
    Gravity,
    Height,
    Layer,
    Percent,
    Quality,
    Rotate,
    Width,
    X,
    Y,
}

impl Field {
    /// All fields, in canonical emission order (by token letter).
    pub const ALL: [Field; 12] = [
        Field::Border,
        Field::Crop,
        Field::Filter,
        Field::Gravity,
        Field::Height,
        Field::Layer,
        Field::Percent,
        Field::Quality,
        Field::Rotate,
        Field::Width,
        Field::X,
        Field::Y,
    ];

    /// Token letter for the field.
    pub fn letter(self) -> char {
        match self {
            Field::Border => 'b',
            Field::Crop => 'c',
            Field::Filter => 'f',
            Field::Gravity => 'g',
            Field::Height => 'h',
            Field::Layer => 'l',
            Field::Percent => 'p',
            Field::Quality => 'q',
            Field::Rotate => 'r',
            Field::Width => 'w',
            Field::X => 'x',
            Field::Y => 'y',
        }
    }

    /// Field for a token letter.
    pub fn from_letter(letter: char) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.letter() == letter)
    }

    /// Long name, as used by `disable_operates`.
    pub fn name(self) -> &'static str {
        match self {
            Field::Border => "border",
            Field::Crop => "crop",
            Field::Filter => "filter",
            Field::Gravity => "gravity",
            Field::Height => "height",
            Field::Layer => "layer",
            Field::Percent => "percent",
            Field::Quality => "quality",
            Field::Rotate => "rotate",
            Field::Width => "width",
            Field::X => "x",
            Field::Y => "y",
        }
    }

    /// Field for a long name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name.trim()))
    }
}

// =============================================================================
// Field values
// =============================================================================

/// Crop mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crop {
    /// Explicit crop box edge (the width; height comes from gravity or is square)
    Size(u32),
    /// Crop-to-fill the requested box during resize
    Fill,
}

impl fmt::Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crop::Size(n) => write!(f, "{}", n),
            Crop::Fill => f.write_str("fill"),
        }
    }
}

/// Crop height or anchor edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    Height(u32),
    Top,
    Bottom,
    Left,
    Right,
}

impl Gravity {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "top" => Some(Gravity::Top),
            "bottom" => Some(Gravity::Bottom),
            "left" => Some(Gravity::Left),
            "right" => Some(Gravity::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gravity::Height(n) => write!(f, "{}", n),
            Gravity::Top => f.write_str("top"),
            Gravity::Bottom => f.write_str("bottom"),
            Gravity::Left => f.write_str("left"),
            Gravity::Right => f.write_str("right"),
        }
    }
}

/// Named image filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    Gray,
    Negative,
    Gamma,
    Sharp,
    Lomo,
    Carve,
    SoftenFace,
}

impl Filter {
    pub fn name(self) -> &'static str {
        match self {
            Filter::Gray => "gray",
            Filter::Negative => "negative",
            Filter::Gamma => "gamma",
            Filter::Sharp => "sharp",
            Filter::Lomo => "lomo",
            Filter::Carve => "carve",
            Filter::SoftenFace => "softenface",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "gray" => Some(Filter::Gray),
            "negative" => Some(Filter::Negative),
            "gamma" => Some(Filter::Gamma),
            "sharp" => Some(Filter::Sharp),
            "lomo" => Some(Filter::Lomo),
            "carve" => Some(Filter::Carve),
            "softenface" => Some(Filter::SoftenFace),
            _ => None,
        }
    }
}

// =============================================================================
// Raw value parsing
// =============================================================================

/// Parse a token value as an integer.
///
/// Plain integers parse exactly; decimal and exponent forms are truncated
/// toward zero. Anything else is not numeric.
pub fn parse_number(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    // Reject inf/nan spellings that f64 parsing accepts
    if !raw.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .map(|f| f.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}

fn positive(n: i64) -> Option<u32> {
    (n > 0).then(|| n.min(u32::MAX as i64) as u32)
}

/// Parse a crop value: a positive edge length or `fill`.
pub fn parse_crop(raw: &str) -> Option<Crop> {
    match parse_number(raw) {
        Some(n) => positive(n).map(Crop::Size),
        None => (raw.to_ascii_lowercase() == "fill").then_some(Crop::Fill),
    }
}

/// Parse a gravity value: a positive height or an edge name.
pub fn parse_gravity(raw: &str) -> Option<Gravity> {
    match parse_number(raw) {
        Some(n) => positive(n).map(Gravity::Height),
        None => Gravity::from_name(&raw.to_ascii_lowercase()),
    }
}

/// Parse a filter name.
pub fn parse_filter(raw: &str) -> Option<Filter> {
    Filter::from_name(&raw.to_ascii_lowercase())
}

/// Parse a positive dimension.
pub fn parse_dimension(raw: &str) -> Option<u32> {
    parse_number(raw).and_then(positive)
}

/// Parse a crop offset, saturated to the `i32` range.
pub fn parse_offset(raw: &str) -> Option<i64> {
    parse_number(raw).map(|n| n.clamp(i32::MIN as i64, i32::MAX as i64))
}

// =============================================================================
// Transform spec
// =============================================================================

/// Resolved transform parameters for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSpec {
    pub border: Option<String>,
    pub crop: Option<Crop>,
    pub filter: Option<Filter>,
    pub gravity: Option<Gravity>,
    pub height: Option<u32>,
    pub layer: Option<String>,
    pub percent: Option<u8>,
    pub quality: Option<u8>,
    pub rotate: Option<u16>,
    pub width: Option<u32>,
    pub x: Option<i64>,
    pub y: Option<i64>,
}

impl TransformSpec {
    /// Serialized token value of a field, if set.
    pub fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::Border => self.border.clone(),
            Field::Crop => self.crop.map(|c| c.to_string()),
            Field::Filter => self.filter.map(|f| f.name().to_string()),
            Field::Gravity => self.gravity.map(|g| g.to_string()),
            Field::Height => self.height.map(|v| v.to_string()),
            Field::Layer => self.layer.clone(),
            Field::Percent => self.percent.map(|v| v.to_string()),
            Field::Quality => self.quality.map(|v| v.to_string()),
            Field::Rotate => self.rotate.map(|v| v.to_string()),
            Field::Width => self.width.map(|v| v.to_string()),
            Field::X => self.x.map(|v| v.to_string()),
            Field::Y => self.y.map(|v| v.to_string()),
        }
    }

    /// Clear a field.
    pub fn clear(&mut self, field: Field) {
        match field {
            Field::Border => self.border = None,
            Field::Crop => self.crop = None,
            Field::Filter => self.filter = None,
            Field::Gravity => self.gravity = None,
            Field::Height => self.height = None,
            Field::Layer => self.layer = None,
            Field::Percent => self.percent = None,
            Field::Quality => self.quality = None,
            Field::Rotate => self.rotate = None,
            Field::Width => self.width = None,
            Field::X => self.x = None,
            Field::Y => self.y = None,
        }
    }

    /// Returns the numeric crop edge, if the crop is an explicit box.
    pub fn crop_size(&self) -> Option<u32> {
        match self.crop {
            Some(Crop::Size(n)) => Some(n),
            _ => None,
        }
    }

    pub fn is_fill(&self) -> bool {
        self.crop == Some(Crop::Fill)
    }
}

// =============================================================================
// Tests
// =============================================================================
