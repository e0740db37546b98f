//! Pixel effects used by the named filters.
//!
//! Effects operate on every frame and chain:
//!
//! ```ignore
//! image.effects().mosaic(8).borderline().emboss();
//! ```

use image::imageops;
use image::{Rgba, RgbaImage};

use super::raster::Image;

/// 3×3 edge-detection kernel.
const BORDERLINE_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];

/// 3×3 emboss kernel (sums to one, so flat areas keep their colour).
const EMBOSS_KERNEL: [f32; 9] = [-2.0, -1.0, 0.0, -1.0, 1.0, 1.0, 0.0, 1.0, 2.0];

/// Chainable effect builder over an [`Image`].
pub struct Effects<'a> {
    image: &'a mut Image,
}

impl<'a> Effects<'a> {
    pub(crate) fn new(image: &'a mut Image) -> Self {
        Self { image }
    }

    /// Luma conversion (ITU-R BT.601 weights), alpha preserved.
    pub fn grayscale(&mut self) -> &mut Self {
        self.map_pixels(|[r, g, b, a]| {
            let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32).round() as u8;
            [luma, luma, luma, a]
        })
    }

    /// Invert colour channels, alpha preserved.
    pub fn negative(&mut self) -> &mut Self {
        self.map_pixels(|[r, g, b, a]| [255 - r, 255 - g, 255 - b, a])
    }

    /// Gamma correction: `out = 255 * (in / 255) ^ (1 / gamma)`.
    pub fn gamma(&mut self, gamma: f32) -> &mut Self {
        let exponent = 1.0 / gamma;
        let table: Vec<u8> = (0..=255u16)
            .map(|v| {
                (255.0 * (v as f32 / 255.0).powf(exponent))
                    .round()
                    .clamp(0.0, 255.0) as u8
            })
            .collect();
        self.map_pixels(|[r, g, b, a]| {
            [table[r as usize], table[g as usize], table[b as usize], a]
        })
    }

    /// Unsharp mask.
    pub fn sharpen(&mut self) -> &mut Self {
        self.image
            .for_each_frame(|buffer| *buffer = imageops::unsharpen(&*buffer, 1.0, 0));
        self
    }

    /// Gaussian blur with standard deviation `sigma`.
    pub fn blur(&mut self, sigma: f32) -> &mut Self {
        self.image
            .for_each_frame(|buffer| *buffer = imageops::blur(&*buffer, sigma));
        self
    }

    /// Shift brightness by `percent` of the full range (-100..=100).
    pub fn brightness(&mut self, percent: i32) -> &mut Self {
        let delta = (percent.clamp(-100, 100) as f32 * 2.55).round() as i32;
        self.image
            .for_each_frame(|buffer| *buffer = imageops::brighten(&*buffer, delta));
        self
    }

    /// Average colour over square blocks of `block` pixels.
    pub fn mosaic(&mut self, block: u32) -> &mut Self {
        let block = block.max(1);
        self.image.for_each_frame(|buffer| pixelate(buffer, block));
        self
    }

    /// Edge detection.
    pub fn borderline(&mut self) -> &mut Self {
        self.convolve(&BORDERLINE_KERNEL)
    }

    pub fn emboss(&mut self) -> &mut Self {
        self.convolve(&EMBOSS_KERNEL)
    }

    fn convolve(&mut self, kernel: &[f32; 9]) -> &mut Self {
        self.image.for_each_frame(|buffer| {
            let mut filtered: RgbaImage = imageops::filter3x3(&*buffer, kernel);
            // The kernel also runs over alpha; keep the original mask.
            for (out, src) in filtered.pixels_mut().zip(buffer.pixels()) {
                out.0[3] = src.0[3];
            }
            *buffer = filtered;
        });
        self
    }

    fn map_pixels(&mut self, f: impl Fn([u8; 4]) -> [u8; 4]) -> &mut Self {
        self.image.for_each_frame(|buffer| {
            for pixel in buffer.pixels_mut() {
                *pixel = Rgba(f(pixel.0));
            }
        });
        self
    }
}

fn pixelate(buffer: &mut RgbaImage, block: u32) {
    let (width, height) = buffer.dimensions();
    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let bw = block.min(width - bx);
            let bh = block.min(height - by);
            let mut sum = [0u64; 4];
            for y in by..by + bh {
                for x in bx..bx + bw {
                    let p = buffer.get_pixel(x, y).0;
                    for c in 0..4 {
                        sum[c] += p[c] as u64;
                    }
                }
            }
            let count = (bw * bh) as u64;
            let avg = Rgba(sum.map(|s| ((s + count / 2) / count) as u8));
            for y in by..by + bh {
                for x in bx..bx + bw {
                    buffer.put_pixel(x, y, avg);
                }
            }
        }
    }
}
