//! Text rasterization for watermarks.
//!
//! Text is laid out as a single SVG `<text>` element with `usvg` against a
//! font database holding only the configured font, then rendered with
//! `resvg` into a tightly cropped RGBA buffer.

use std::path::Path;
use std::sync::Arc;

use image::{Rgba, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use usvg::fontdb;

use crate::error::BackendError;

/// Loaded font at a fixed size and colour.
#[derive(Clone)]
pub struct Font {
    db: Arc<fontdb::Database>,
    family: String,
    size: f32,
    color: Rgba<u8>,
}

impl std::fmt::Debug for Font {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Font")
            .field("family", &self.family)
            .field("size", &self.size)
            .field("color", &self.color)
            .finish()
    }
}

impl Font {
    /// Load the first face of the font file at `path`.
    pub fn load(path: &Path, size: f32, color: Rgba<u8>) -> Result<Self, BackendError> {
        if !(size > 0.0) {
            return Err(BackendError::Font(format!("invalid font size {size}")));
        }
        let data = std::fs::read(path)
            .map_err(|e| BackendError::Font(format!("{}: {e}", path.display())))?;

        let mut db = fontdb::Database::new();
        db.load_font_data(data);

        let family = db
            .faces()
            .next()
            .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
            .ok_or_else(|| {
                BackendError::Font(format!("{}: no usable font face", path.display()))
            })?;

        Ok(Self {
            db: Arc::new(db),
            family,
            size,
            color,
        })
    }

    /// Render `text` into a buffer cropped to the ink bounds.
    pub fn render(&self, text: &str) -> Result<RgbaImage, BackendError> {
        let chars = text.chars().count().max(1) as f32;
        let canvas_w = (self.size * (chars + 2.0) * 2.0).ceil();
        let canvas_h = (self.size * 3.0).ceil();
        let [r, g, b, a] = self.color.0;

        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{canvas_w}" height="{canvas_h}"><text x="{x}" y="{y}" font-family="{family}" font-size="{size}" fill="rgb({r},{g},{b})" fill-opacity="{opacity}">{text}</text></svg>"#,
            x = self.size,
            y = self.size * 2.0,
            family = escape_xml(&self.family),
            size = self.size,
            opacity = a as f32 / 255.0,
            text = escape_xml(text),
        );

        let opts = usvg::Options {
            fontdb: self.db.clone(),
            ..Default::default()
        };
        let tree = usvg::Tree::from_str(&svg, &opts)
            .map_err(|e| BackendError::Font(format!("text layout failed: {e}")))?;

        let bbox = tree.root().abs_bounding_box();
        if bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return Err(BackendError::Font(format!(
                "text '{text}' produced no glyphs"
            )));
        }

        let width = bbox.width().ceil() as u32;
        let height = bbox.height().ceil() as u32;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            BackendError::Font(format!("cannot allocate {width}x{height} text canvas"))
        })?;
        resvg::render(
            &tree,
            Transform::from_translate(-bbox.x(), -bbox.y()),
            &mut pixmap.as_mut(),
        );

        let mut buffer = RgbaImage::new(width, height);
        for (out, px) in buffer.pixels_mut().zip(pixmap.pixels()) {
            let c = px.demultiply();
            *out = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(buffer)
    }
}

/// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA` (leading `#` optional).
pub fn parse_hex_color(raw: &str) -> Result<Rgba<u8>, BackendError> {
    let hex = raw.trim().trim_start_matches('#');
    let invalid = || BackendError::Font(format!("invalid colour '{raw}'"));

    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());

    match hex.len() {
        3 => {
            let digits: Vec<u8> = hex
                .chars()
                .filter_map(|c| c.to_digit(16))
                .map(|d| (d * 17) as u8)
                .collect();
            Ok(Rgba([digits[0], digits[1], digits[2], 255]))
        }
        6 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, 255])),
        8 => Ok(Rgba([byte(0)?, byte(2)?, byte(4)?, byte(6)?])),
        _ => Err(invalid()),
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}
