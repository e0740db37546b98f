//! Disk cache integration tests.
//!
//! Tests verify:
//! - Rendered thumbnails are stored under the canonical filename
//! - Subsequent requests are served from the cache
//! - Cache entries are served even after the source disappears
//! - Non-canonical requests never create cache entries

use axum::http::StatusCode;

use super::test_utils::{body_bytes, get, send, Deployment};

#[tokio::test]
async fn test_cache_store_then_hit() {
    let deployment = Deployment::new();
    let router = deployment.router(&deployment.cache_settings());

    let first = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-thumb-cache").unwrap(), "stored");
    let first_body = body_bytes(first).await;

    let cached = deployment.cache.join("d").join("a,w_100.jpg");
    assert!(cached.is_file());
    assert_eq!(std::fs::read(&cached).unwrap(), first_body.as_ref());

    let second = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-thumb-cache").unwrap(), "hit");
    assert_eq!(body_bytes(second).await, first_body);
}

#[tokio::test]
async fn test_cache_keeps_sub_path() {
    let deployment = Deployment::new();
    let router = deployment.router(&deployment.cache_settings());

    let response = send(&router, get("/thumb/d/sub/c,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);

    assert!(deployment
        .cache
        .join("d")
        .join("sub")
        .join("c,w_100.jpg")
        .is_file());
}

#[tokio::test]
async fn test_cache_hit_without_source() {
    let deployment = Deployment::new();
    let router = deployment.router(&deployment.cache_settings());

    let response = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);

    std::fs::remove_file(deployment.upload.join("a.jpg")).unwrap();

    let response = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-thumb-cache").unwrap(), "hit");
}

#[tokio::test]
async fn test_redirect_does_not_write_cache() {
    let deployment = Deployment::new();
    let router = deployment.router(&deployment.cache_settings());

    let response = send(&router, get("/thumb/d/a,w_5000.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    assert!(!deployment.cache.join("d").join("a,w_5000.jpg").exists());
    assert!(!deployment.cache.join("d").join("a,w_2000.jpg").exists());
}

#[tokio::test]
async fn test_cache_disabled() {
    let deployment = Deployment::new();
    let group = format!(
        "cache = false\nthumb_cache_path = '{}'",
        deployment.cache.display()
    );
    let router = deployment.router(&group);

    let response = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-thumb-cache").unwrap(), "bypass");
    assert!(!deployment.cache.exists());
}
