//! API integration tests for the HTTP surface and error presentation.
//!
//! Tests verify:
//! - Health endpoint
//! - Method handling
//! - Error responses at each debug level
//! - Response headers

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};

use urlthumb::RouterConfig;

use super::test_utils::{body_bytes, get, send, Deployment, TEST_HOST};

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());
}

// =============================================================================
// Methods
// =============================================================================

#[tokio::test]
async fn test_post_not_allowed() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/thumb/d/a,w_100.jpg")
        .header("host", TEST_HOST)
        .body(Body::empty())
        .unwrap();

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_head_request() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let request = Request::builder()
        .method(Method::HEAD)
        .uri("/thumb/d/a,w_100.jpg")
        .header("host", TEST_HOST)
        .body(Body::empty())
        .unwrap();

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
}

// =============================================================================
// Success Headers
// =============================================================================

#[tokio::test]
async fn test_thumbnail_headers() {
    let deployment = Deployment::new();
    let router = deployment.router_with("", "", RouterConfig::new().with_cache_max_age(600));

    let response = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "image/jpeg");
    assert_eq!(headers.get("cache-control").unwrap(), "public, max-age=600");
    assert_eq!(headers.get("x-thumb-cache").unwrap(), "bypass");
}

// =============================================================================
// Errors
// =============================================================================

#[tokio::test]
async fn test_missing_source_raises_json() {
    let deployment = Deployment::new();
    let router = deployment.router("debug = 2");

    let response = send(&router, get("/thumb/d/missing,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "not_found");
    assert_eq!(error["status"], 404);
}

#[tokio::test]
async fn test_missing_source_serves_error_image() {
    let deployment = Deployment::new();
    let group = format!("debug = 0\nerror_url = '{}'", deployment.error_image.display());
    let router = deployment.router(&group);

    let response = send(&router, get("/thumb/d/missing,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert!(response.headers().get("x-thumb-error").is_none());

    let body = body_bytes(response).await;
    let expected = std::fs::read(&deployment.error_image).unwrap();
    assert_eq!(body.as_ref(), expected.as_slice());
}

#[tokio::test]
async fn test_error_header_at_debug_one() {
    let deployment = Deployment::new();
    let group = format!("debug = 1\nerror_url = '{}'", deployment.error_image.display());
    let router = deployment.router(&group);

    let response = send(&router, get("/thumb/d/missing,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    let message = response
        .headers()
        .get("x-thumb-error")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(message.contains("missing.jpg"));
}

#[tokio::test]
async fn test_unknown_group_uses_default_policy() {
    let deployment = Deployment::new();
    let defaults = format!("error_url = '{}'", deployment.error_image.display());
    let router = deployment.router_with(&defaults, "debug = 2", RouterConfig::new());

    // The group raises, but the request never reaches it
    let response = send(&router, get("/thumb/zz/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
}

#[tokio::test]
async fn test_unknown_group_without_fallback_image() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/zz/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "group_not_configured");
}

#[tokio::test]
async fn test_unsupported_extension() {
    let deployment = Deployment::new();
    let router = deployment.router("debug = 2");

    let response = send(&router, get("/thumb/d/a,w_100.tiff")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "invalid_request");
}

#[tokio::test]
async fn test_disallowed_extension() {
    let deployment = Deployment::new();
    let router = deployment.router("debug = 2\nallow_extensions = ['png']");

    let response = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&router, get("/thumb/d/b,w_100.png")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_path_traversal_rejected() {
    let deployment = Deployment::new();
    let router = deployment.router("debug = 2");

    let response = send(&router, get("/thumb/d/..%2F..%2Fetc/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_source_root() {
    let deployment = Deployment::new();
    std::fs::remove_dir_all(&deployment.upload).unwrap();
    let router = deployment.router("debug = 2");

    let response = send(&router, get("/thumb/d/a,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "configuration_error");
}
