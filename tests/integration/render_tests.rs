//! Rendering integration tests.
//!
//! Tests verify the output geometry and pixels of each pipeline stage as
//! seen through the HTTP layer.

use std::io::Cursor;

use axum::http::StatusCode;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, GenericImageView};

use super::test_utils::{body_bytes, get, location, send, url, Deployment};

async fn fetch_image(deployment_group: &str, path: &str) -> DynamicImage {
    let deployment = Deployment::new();
    fetch_from(&deployment, deployment_group, path).await
}

async fn fetch_from(deployment: &Deployment, group: &str, path: &str) -> DynamicImage {
    let router = deployment.router(group);
    let response = send(&router, get(path)).await;
    assert_eq!(response.status(), StatusCode::OK, "GET {}", path);
    let body = body_bytes(response).await;
    image::load_from_memory(&body).unwrap()
}

// =============================================================================
// Geometry
// =============================================================================

#[tokio::test]
async fn test_resize_width_keeps_aspect() {
    let img = fetch_image("", "/thumb/d/a,w_100.jpg").await;
    assert_eq!(img.dimensions(), (100, 75));
}

#[tokio::test]
async fn test_resize_box_fits_inside() {
    let img = fetch_image("", "/thumb/d/a,h_100,w_100.jpg").await;
    assert_eq!(img.dimensions(), (100, 75));
}

#[tokio::test]
async fn test_fill_crop_covers_box() {
    let img = fetch_image("", "/thumb/d/a,c_fill,h_100,w_100.jpg").await;
    assert_eq!(img.dimensions(), (100, 100));
}

#[tokio::test]
async fn test_numeric_crop() {
    let img = fetch_image("", "/thumb/d/a,c_100.jpg").await;
    assert_eq!(img.dimensions(), (100, 100));
}

#[tokio::test]
async fn test_numeric_crop_with_height_gravity() {
    let img = fetch_image("", "/thumb/d/b,c_120,g_60.png").await;
    assert_eq!(img.dimensions(), (120, 60));
}

#[tokio::test]
async fn test_numeric_crop_with_offsets() {
    // Gradient red channel is x, green is y
    let img = fetch_image("", "/thumb/d/b,c_50,x_10,y_20.png").await;
    assert_eq!(img.dimensions(), (50, 50));
    let pixel = img.get_pixel(0, 0);
    assert_eq!((pixel[0], pixel[1]), (10, 20));
}

#[tokio::test]
async fn test_numeric_crop_box_request_is_canonical() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/a,c_100,h_100,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("location").is_none());
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");

    let body = body_bytes(response).await;
    let img = image::load_from_memory(&body).unwrap();
    assert_eq!(img.dimensions(), (100, 100));
}

#[tokio::test]
async fn test_crop_offset_past_edge_is_pulled_inside() {
    // Box pinned to the right edge: x = 400 - 50
    let img = fetch_image("", "/thumb/d/b,c_50,x_500,y_0.png").await;
    assert_eq!(img.dimensions(), (50, 50));
    assert_eq!(img.get_pixel(0, 0)[0], (350 % 256) as u8);

    let img = fetch_image("", "/thumb/d/a,c_100,x_500,y_0.jpg").await;
    assert_eq!(img.dimensions(), (100, 100));
}

#[tokio::test]
async fn test_huge_crop_offset_redirects_then_renders() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/a,c_100,x_9223372036854775807,y_0.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        url("/thumb/d/a,c_100,x_2147483647,y_0.jpg")
    );

    let img = fetch_from(&deployment, "", "/thumb/d/a,c_100,x_2147483647,y_0.jpg").await;
    assert_eq!(img.dimensions(), (100, 100));
}

#[tokio::test]
async fn test_percent_scale() {
    let img = fetch_image("", "/thumb/d/a,p_50.jpg").await;
    assert_eq!(img.dimensions(), (200, 150));
}

#[tokio::test]
async fn test_rotate_right_angle() {
    let img = fetch_image("", "/thumb/d/a,r_90.jpg").await;
    assert_eq!(img.dimensions(), (300, 400));
}

#[tokio::test]
async fn test_sub_path_source() {
    let img = fetch_image("", "/thumb/d/sub/c,w_200.jpg").await;
    assert_eq!(img.dimensions(), (200, 150));
}

#[tokio::test]
async fn test_png_output() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/b,w_100.png")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let body = body_bytes(response).await;
    assert_eq!(
        image::guess_format(&body).unwrap(),
        image::ImageFormat::Png
    );
}

// =============================================================================
// Filters
// =============================================================================

#[tokio::test]
async fn test_gray_filter() {
    let img = fetch_image("", "/thumb/d/b,f_gray,w_100.png").await;
    let rgba = img.to_rgba8();
    for pixel in rgba.pixels() {
        assert_eq!(pixel[0], pixel[1]);
        assert_eq!(pixel[1], pixel[2]);
    }
}

#[tokio::test]
async fn test_negative_filter() {
    let plain = fetch_image("", "/thumb/d/b,w_100.png").await.to_rgba8();
    let negative = fetch_image("", "/thumb/d/b,f_negative,w_100.png")
        .await
        .to_rgba8();

    let (a, b) = (plain.get_pixel(10, 10), negative.get_pixel(10, 10));
    assert_eq!(a[0], 255 - b[0]);
    assert_eq!(a[1], 255 - b[1]);
    assert_eq!(a[2], 255 - b[2]);
}

#[tokio::test]
async fn test_unknown_filter_redirects() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/b,f_sepia,w_100.png")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

// =============================================================================
// Watermark
// =============================================================================

#[tokio::test]
async fn test_image_watermark_top_left() {
    let deployment = Deployment::new();
    let layer = deployment.watermark_layer();
    let group = format!(
        "[thumbers.d.watermark]\nenable = true\nposition = 'tl'\nlayer_file = '{}'",
        layer.display()
    );

    let img = fetch_from(&deployment, &group, "/thumb/d/b,w_100.png")
        .await
        .to_rgba8();
    assert_eq!(img.dimensions(), (100, 75));
    assert_eq!(img.get_pixel(5, 5).0, [0, 0, 255, 255]);
    assert_ne!(img.get_pixel(50, 50).0, [0, 0, 255, 255]);
}

#[tokio::test]
async fn test_image_watermark_bottom_right() {
    let deployment = Deployment::new();
    let layer = deployment.watermark_layer();
    let group = format!(
        "[thumbers.d.watermark]\nenable = true\nlayer_file = '{}'",
        layer.display()
    );

    let img = fetch_from(&deployment, &group, "/thumb/d/b,w_100.png")
        .await
        .to_rgba8();
    assert_eq!(img.get_pixel(99, 74).0, [0, 0, 255, 255]);
    assert_eq!(img.get_pixel(80, 55).0, [0, 0, 255, 255]);
    assert_ne!(img.get_pixel(5, 5).0, [0, 0, 255, 255]);
}

/// Pixels that differ between two equally sized images inside a region.
fn changed_in(
    a: &image::RgbaImage,
    b: &image::RgbaImage,
    xs: std::ops::Range<u32>,
    ys: std::ops::Range<u32>,
) -> usize {
    ys.flat_map(|y| xs.clone().map(move |x| (x, y)))
        .filter(|&(x, y)| a.get_pixel(x, y) != b.get_pixel(x, y))
        .count()
}

#[tokio::test]
async fn test_text_watermark_top_left() {
    let deployment = Deployment::new();
    let plain = fetch_from(&deployment, "", "/thumb/d/b,w_200.png")
        .await
        .to_rgba8();
    let group = deployment.text_watermark("tl", "WM");
    let marked = fetch_from(&deployment, &group, "/thumb/d/b,w_200.png")
        .await
        .to_rgba8();

    assert_eq!(marked.dimensions(), (200, 150));
    assert!(changed_in(&plain, &marked, 0..60, 0..40) > 0);
    assert_eq!(changed_in(&plain, &marked, 100..200, 75..150), 0);
}

#[tokio::test]
async fn test_text_watermark_bottom_right() {
    let deployment = Deployment::new();
    let plain = fetch_from(&deployment, "", "/thumb/d/b,w_200.png")
        .await
        .to_rgba8();
    let group = deployment.text_watermark("br", "WM");
    let marked = fetch_from(&deployment, &group, "/thumb/d/b,w_200.png")
        .await
        .to_rgba8();

    assert!(changed_in(&plain, &marked, 140..200, 110..150) > 0);
    assert_eq!(changed_in(&plain, &marked, 0..100, 0..75), 0);
}

#[tokio::test]
async fn test_watermark_disabled() {
    let deployment = Deployment::new();
    let layer = deployment.watermark_layer();
    let group = format!(
        "[thumbers.d.watermark]\nenable = false\nposition = 'tl'\nlayer_file = '{}'",
        layer.display()
    );

    let img = fetch_from(&deployment, &group, "/thumb/d/b,w_100.png")
        .await
        .to_rgba8();
    assert_ne!(img.get_pixel(5, 5).0, [0, 0, 255, 255]);
}

// =============================================================================
// Animation
// =============================================================================

#[tokio::test]
async fn test_gif_crop_drops_frames() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/anim,c_100.gif")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/gif");

    let body = body_bytes(response).await;
    let frames = GifDecoder::new(Cursor::new(body.to_vec()))
        .unwrap()
        .into_frames()
        .collect_frames()
        .unwrap();

    // 20 frames, 30% removed
    assert_eq!(frames.len(), 14);
    for frame in &frames {
        assert_eq!(frame.buffer().dimensions(), (100, 100));
    }
}

#[tokio::test]
async fn test_gif_resize_keeps_every_frame() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/anim,w_100.gif")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let frames = GifDecoder::new(Cursor::new(body.to_vec()))
        .unwrap()
        .into_frames()
        .collect_frames()
        .unwrap();
    assert_eq!(frames.len(), 20);
}

#[tokio::test]
async fn test_gif_as_still_jpeg() {
    let deployment = Deployment::new();
    // The source is named by the request extension, so copy the animation
    std::fs::copy(
        deployment.upload.join("anim.gif"),
        deployment.upload.join("anim.jpg"),
    )
    .unwrap();

    let img = fetch_from(&deployment, "", "/thumb/d/anim,w_100.jpg").await;
    assert_eq!(img.dimensions(), (100, 75));
}
