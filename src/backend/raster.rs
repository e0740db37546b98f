//! Frame-based raster image.
//!
//! Every image is a list of full-canvas RGBA frames. Still images have one
//! frame; animated GIFs have one per animation step, already composited by
//! the decoder so each frame stands alone.

use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use image::codecs::gif::{GifDecoder, GifEncoder, Repeat};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, Delay, DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};

use crate::error::BackendError;

use super::effects::Effects;

/// Resampling filter for every resize.
const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Canvas colour revealed by non-right-angle rotations.
const ROTATE_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// How [`Image::thumbnail`] fits the source into the target box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbnailMode {
    /// Scale to fit inside the box, keeping aspect ratio. Output may be
    /// smaller than the box on one axis.
    Inset,
    /// Scale to cover the box, then crop the centre to exactly the box.
    Outbound,
}

/// One animation step.
#[derive(Debug, Clone)]
pub struct Frame {
    pub buffer: RgbaImage,
    pub delay: Delay,
}

impl Frame {
    pub fn still(buffer: RgbaImage) -> Self {
        Self {
            buffer,
            delay: Delay::from_numer_denom_ms(0, 1),
        }
    }
}

/// Decoded image with one or more frames of equal size.
#[derive(Debug, Clone)]
pub struct Image {
    frames: Vec<Frame>,
}

impl Image {
    /// Decode `path`, keeping all frames for GIF sources.
    pub fn open(path: &Path) -> Result<Self, BackendError> {
        let open_err = |message: String| BackendError::Open {
            path: path.display().to_string(),
            message,
        };

        let reader = ImageReader::open(path)
            .map_err(|e| open_err(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| open_err(e.to_string()))?;

        if reader.format() == Some(ImageFormat::Gif) {
            let file = File::open(path).map_err(|e| open_err(e.to_string()))?;
            let decoder = GifDecoder::new(BufReader::new(file))
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            let frames = decoder
                .into_frames()
                .collect_frames()
                .map_err(|e| BackendError::Decode(e.to_string()))?
                .into_iter()
                .map(|frame| {
                    let delay = frame.delay();
                    Frame {
                        buffer: frame.into_buffer(),
                        delay,
                    }
                })
                .collect();
            return Self::from_frames(frames);
        }

        let decoded = reader
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        Ok(Self::from_rgba(decoded.to_rgba8()))
    }

    /// Single-frame image.
    pub fn from_rgba(buffer: RgbaImage) -> Self {
        Self {
            frames: vec![Frame::still(buffer)],
        }
    }

    /// Multi-frame image. Fails when `frames` is empty.
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self, BackendError> {
        if frames.is_empty() {
            return Err(BackendError::Decode("image has no frames".to_string()));
        }
        let mut image = Self { frames };
        image.coalesce();
        Ok(image)
    }

    /// Canvas size `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        self.frames[0].buffer.dimensions()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn is_animated(&self) -> bool {
        self.frames.len() > 1
    }

    /// First frame pixels.
    pub fn first_frame(&self) -> &RgbaImage {
        &self.frames[0].buffer
    }

    /// Independent copy for effect layering.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Chain pixel effects over every frame.
    pub fn effects(&mut self) -> Effects<'_> {
        Effects::new(self)
    }

    pub(crate) fn for_each_frame(&mut self, mut f: impl FnMut(&mut RgbaImage)) {
        for frame in &mut self.frames {
            f(&mut frame.buffer);
        }
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Crop every frame to the box at `(x, y)` of `width × height`.
    ///
    /// The box is clipped to the canvas; a box with no overlap fails.
    pub fn crop(&mut self, x: i64, y: i64, width: u32, height: u32) -> Result<(), BackendError> {
        let (canvas_w, canvas_h) = self.size();
        let left = x.clamp(0, canvas_w as i64);
        let top = y.clamp(0, canvas_h as i64);
        let right = x.saturating_add(width as i64).clamp(0, canvas_w as i64);
        let bottom = y.saturating_add(height as i64).clamp(0, canvas_h as i64);

        if right <= left || bottom <= top {
            return Err(BackendError::Geometry(format!(
                "crop box {width}x{height}+{x}+{y} lies outside {canvas_w}x{canvas_h}"
            )));
        }

        let (left, top) = (left as u32, top as u32);
        let (w, h) = ((right as u32) - left, (bottom as u32) - top);
        if (left, top, w, h) == (0, 0, canvas_w, canvas_h) {
            return Ok(());
        }
        self.for_each_frame(|buffer| {
            *buffer = imageops::crop_imm(&*buffer, left, top, w, h).to_image();
        });
        Ok(())
    }

    /// Resize every frame to exactly `width × height`.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::Geometry(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        if self.size() == (width, height) {
            return Ok(());
        }
        self.for_each_frame(|buffer| {
            *buffer = imageops::resize(&*buffer, width, height, RESAMPLE_FILTER);
        });
        Ok(())
    }

    /// Fit into `width × height` according to `mode`.
    pub fn thumbnail(
        &mut self,
        width: u32,
        height: u32,
        mode: ThumbnailMode,
    ) -> Result<(), BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::Geometry(format!(
                "cannot thumbnail to {width}x{height}"
            )));
        }
        let (src_w, src_h) = self.size();
        if (src_w, src_h) == (width, height) {
            return Ok(());
        }

        let ratio_w = width as f64 / src_w as f64;
        let ratio_h = height as f64 / src_h as f64;

        match mode {
            ThumbnailMode::Inset => {
                let ratio = ratio_w.min(ratio_h);
                let w = ((src_w as f64 * ratio).round() as u32).clamp(1, width);
                let h = ((src_h as f64 * ratio).round() as u32).clamp(1, height);
                self.resize(w, h)
            }
            ThumbnailMode::Outbound => {
                let ratio = ratio_w.max(ratio_h);
                let w = ((src_w as f64 * ratio).ceil() as u32).max(width);
                let h = ((src_h as f64 * ratio).ceil() as u32).max(height);
                self.resize(w, h)?;
                let x = ((w - width) / 2) as i64;
                let y = ((h - height) / 2) as i64;
                self.crop(x, y, width, height)
            }
        }
    }

    /// Rotate clockwise by `degrees`.
    ///
    /// Right angles are lossless; other angles grow the canvas to hold the
    /// rotated image and fill the corners with white.
    pub fn rotate(&mut self, degrees: u16) {
        match degrees % 360 {
            0 => {}
            90 => self.for_each_frame(|b| *b = imageops::rotate90(&*b)),
            180 => self.for_each_frame(|b| *b = imageops::rotate180(&*b)),
            270 => self.for_each_frame(|b| *b = imageops::rotate270(&*b)),
            angle => {
                let radians = (angle as f64).to_radians();
                self.for_each_frame(|b| *b = rotate_free(b, radians));
            }
        }
    }

    /// Alpha-blend `top`'s first frame onto every frame at `(x, y)`.
    pub fn paste(&mut self, top: &Image, x: i64, y: i64) {
        let layer = top.first_frame();
        self.for_each_frame(|buffer| imageops::overlay(buffer, layer, x, y));
    }

    /// Alpha-blend a single buffer onto every frame at `(x, y)`.
    pub fn paste_buffer(&mut self, layer: &RgbaImage, x: i64, y: i64) {
        self.for_each_frame(|buffer| imageops::overlay(buffer, layer, x, y));
    }

    // =========================================================================
    // Animation
    // =========================================================================

    /// Bring every frame onto the first frame's canvas.
    ///
    /// Frames of a different size are drawn over the previous frame so
    /// later operations can treat them uniformly.
    pub fn coalesce(&mut self) {
        let (w, h) = self.size();
        for i in 1..self.frames.len() {
            if self.frames[i].buffer.dimensions() == (w, h) {
                continue;
            }
            let mut canvas = self.frames[i - 1].buffer.clone();
            imageops::overlay(&mut canvas, &self.frames[i].buffer, 0, 0);
            self.frames[i].buffer = canvas;
        }
    }

    /// Remove frames by index. Out-of-range indices are ignored and at least
    /// one frame is always kept.
    pub fn remove_frames(&mut self, indices: &[usize]) {
        let first = self.frames[0].clone();
        let mut index = 0;
        self.frames.retain(|_| {
            let keep = !indices.contains(&index);
            index += 1;
            keep
        });
        if self.frames.is_empty() {
            self.frames.push(first);
        }
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encode for `extension` (lowercase). `quality` applies to JPEG only.
    pub fn encode(&self, extension: &str, quality: u8) -> Result<Vec<u8>, BackendError> {
        let mut output = Vec::new();
        match extension {
            "jpg" | "jpeg" => {
                let rgb = DynamicImage::ImageRgba8(self.first_frame().clone()).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
                encoder
                    .encode_image(&rgb)
                    .map_err(|e| BackendError::Encode(e.to_string()))?;
            }
            "gif" => {
                let mut encoder = GifEncoder::new(&mut output);
                if self.is_animated() {
                    encoder
                        .set_repeat(Repeat::Infinite)
                        .map_err(|e| BackendError::Encode(e.to_string()))?;
                }
                let frames = self
                    .frames
                    .iter()
                    .map(|f| image::Frame::from_parts(f.buffer.clone(), 0, 0, f.delay));
                encoder
                    .encode_frames(frames)
                    .map_err(|e| BackendError::Encode(e.to_string()))?;
            }
            other => {
                let format = match other {
                    "png" => ImageFormat::Png,
                    "bmp" => ImageFormat::Bmp,
                    "webp" => ImageFormat::WebP,
                    _ => return Err(BackendError::UnsupportedFormat(other.to_string())),
                };
                self.first_frame()
                    .write_to(&mut Cursor::new(&mut output), format)
                    .map_err(|e| BackendError::Encode(e.to_string()))?;
            }
        }
        Ok(output)
    }
}

/// Rotate clockwise by `radians` onto an enlarged white canvas using
/// bilinear sampling.
fn rotate_free(src: &RgbaImage, radians: f64) -> RgbaImage {
    let (src_w, src_h) = (src.width() as f64, src.height() as f64);
    let (sin, cos) = radians.sin_cos();

    let out_w = (src_w * cos.abs() + src_h * sin.abs()).round().max(1.0) as u32;
    let out_h = (src_w * sin.abs() + src_h * cos.abs()).round().max(1.0) as u32;
    let (half_out_w, half_out_h) = (out_w as f64 / 2.0, out_h as f64 / 2.0);
    let (half_src_w, half_src_h) = (src_w / 2.0, src_h / 2.0);

    RgbaImage::from_fn(out_w, out_h, |ox, oy| {
        let dx = ox as f64 + 0.5 - half_out_w;
        let dy = oy as f64 + 0.5 - half_out_h;
        // Inverse of a clockwise rotation in y-down coordinates
        let sx = dx * cos + dy * sin + half_src_w - 0.5;
        let sy = -dx * sin + dy * cos + half_src_h - 0.5;
        sample_bilinear(src, sx, sy)
    })
}

fn sample_bilinear(src: &RgbaImage, sx: f64, sy: f64) -> Rgba<u8> {
    let x0 = sx.floor();
    let y0 = sy.floor();
    let fx = sx - x0;
    let fy = sy - y0;

    let fetch = |x: f64, y: f64| -> [f64; 4] {
        if x < 0.0 || y < 0.0 || x >= src.width() as f64 || y >= src.height() as f64 {
            return ROTATE_BACKGROUND.0.map(f64::from);
        }
        src.get_pixel(x as u32, y as u32).0.map(f64::from)
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1.0, y0);
    let p01 = fetch(x0, y0 + 1.0);
    let p11 = fetch(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}
