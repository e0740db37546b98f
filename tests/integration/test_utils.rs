//! Test utilities for integration tests.
//!
//! Builds a temporary deployment (source images, optional cache and fallback
//! image) with a matching TOML group configuration, and helpers to drive the
//! router with `oneshot`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bytes::Bytes;
use http_body_util::BodyExt;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;
use tower::ServiceExt;

use urlthumb::{create_router, RouterConfig, Settings, Thumber};

/// Host used for every test request.
pub const TEST_HOST: &str = "img.example.com";

// =============================================================================
// Source Images
// =============================================================================

/// Gradient so crops and rotations produce distinguishable output.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Write an animated GIF with `frames` frames of alternating colour.
pub fn write_gif(path: &Path, width: u32, height: u32, frames: usize) {
    let file = std::fs::File::create(path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();

    let frames = (0..frames).map(|i| {
        let shade = (i * 12 % 256) as u8;
        let buffer = RgbaImage::from_pixel(width, height, Rgba([shade, 255 - shade, 0, 255]));
        Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
    });
    encoder.encode_frames(frames).unwrap();
}

// =============================================================================
// Deployment Fixture
// =============================================================================

/// A temporary deployment with one group `d` under the `thumb` prefix.
///
/// Sources:
/// - `a.jpg` 400x300
/// - `b.png` 400x300
/// - `sub/c.jpg` 400x300
/// - `anim.gif` 200x150, 20 frames
pub struct Deployment {
    pub dir: TempDir,
    pub upload: PathBuf,
    pub cache: PathBuf,
    pub error_image: PathBuf,
}

impl Deployment {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let upload = dir.path().join("upload");
        let cache = dir.path().join("thumb");
        std::fs::create_dir_all(upload.join("sub")).unwrap();

        gradient(400, 300).save(upload.join("a.jpg")).unwrap();
        gradient(400, 300).save(upload.join("b.png")).unwrap();
        gradient(400, 300).save(upload.join("sub").join("c.jpg")).unwrap();
        write_gif(&upload.join("anim.gif"), 200, 150, 20);

        let error_image = dir.path().join("error.png");
        RgbImage::from_pixel(10, 10, Rgb([255, 0, 0]))
            .save(&error_image)
            .unwrap();

        Self {
            dir,
            upload,
            cache,
            error_image,
        }
    }

    /// Write a 20x20 opaque blue PNG for use as a watermark layer.
    pub fn watermark_layer(&self) -> PathBuf {
        let path = self.dir.path().join("mark.png");
        RgbaImage::from_pixel(20, 20, Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();
        path
    }

    /// Group settings for a text watermark drawn with the bundled test font.
    pub fn text_watermark(&self, position: &str, text: &str) -> String {
        let font = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/Tuffy.ttf");
        format!(
            "[thumbers.d.watermark]\nenable = true\nposition = '{}'\ntext = '{}'\nfont_file = '{}'\nfont_size = 20.0\nfont_color = '#ffffff'",
            position,
            text,
            font.display()
        )
    }

    /// Settings with `max 2000` defaults and group `d` extended by `group_extra`.
    pub fn settings(&self, defaults_extra: &str, group_extra: &str) -> Settings {
        let toml = format!(
            "[defaults]\nmax_width = 2000\nmax_height = 2000\n{}\n\n[thumbers.d]\nsource_path = '{}'\n{}\n",
            defaults_extra,
            self.upload.display(),
            group_extra
        );
        Settings::from_toml_str(&toml).unwrap()
    }

    /// Router for group `d` extended by `group_extra`.
    pub fn router(&self, group_extra: &str) -> Router {
        self.router_with("", group_extra, RouterConfig::new())
    }

    pub fn router_with(
        &self,
        defaults_extra: &str,
        group_extra: &str,
        config: RouterConfig,
    ) -> Router {
        let settings = self.settings(defaults_extra, group_extra);
        create_router(Thumber::new(Arc::new(settings)), config.with_tracing(false))
    }

    /// Group settings that enable the disk cache.
    pub fn cache_settings(&self) -> String {
        format!(
            "cache = true\nthumb_cache_path = '{}'",
            self.cache.display()
        )
    }
}

impl Default for Deployment {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Requests
// =============================================================================

/// GET `path` with the test Host header.
pub fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("host", TEST_HOST)
        .body(Body::empty())
        .unwrap()
}

/// Send one request through a fresh clone of the router.
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// The `Location` header of a redirect.
pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get("location")
        .expect("redirect without Location")
        .to_str()
        .unwrap()
        .to_string()
}

/// Absolute URL on the test host.
pub fn url(path: &str) -> String {
    format!("http://{}{}", TEST_HOST, path)
}
