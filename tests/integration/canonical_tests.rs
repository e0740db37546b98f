//! Canonical URL integration tests.
//!
//! Every thumbnail has exactly one URL. These tests check the redirects
//! issued for non-canonical requests, both before the source is opened
//! (bounds, allow lists, disabled operations, token order) and after it
//! (intrinsic size without stretching).

use std::sync::Arc;

use axum::http::StatusCode;

use urlthumb::{RequestContext, RouterConfig, Thumber};

use super::test_utils::{get, location, send, url, Deployment};

// =============================================================================
// Before Opening the Source
// =============================================================================

#[tokio::test]
async fn test_width_clamped_to_max() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/a,w_5000.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/a,w_2000.jpg"));
}

#[tokio::test]
async fn test_tokens_reordered() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/a,w_100,h_100,c_fill.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/a,c_fill,h_100,w_100.jpg"));
}

#[tokio::test]
async fn test_default_quality_dropped() {
    let deployment = Deployment::new();
    let router = deployment.router("quality = 90");

    let response = send(&router, get("/thumb/d/a,q_90,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/a,w_100.jpg"));
}

#[tokio::test]
async fn test_quality_ignored_for_png() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/b,q_80.png")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/b.png"));
}

#[tokio::test]
async fn test_allow_sizes_clears_unlisted_box() {
    let deployment = Deployment::new();
    let router = deployment.router("allow_sizes = ['100*100']");

    let response = send(&router, get("/thumb/d/a,h_150,w_150.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/a.jpg"));

    let response = send(&router, get("/thumb/d/a,h_100,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_disabled_operation_removed() {
    let deployment = Deployment::new();
    let router = deployment.router("disable_operates = ['rotate', 'filter']");

    let response = send(&router, get("/thumb/d/a,f_gray,r_90,w_100.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/a,w_100.jpg"));
}

#[tokio::test]
async fn test_redirect_keeps_sub_path_and_query() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/sub/c,w_5000.jpg?v=2")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/sub/c,w_2000.jpg?v=2"));
}

#[tokio::test]
async fn test_redirect_uses_forwarded_proto() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let request = axum::http::Request::builder()
        .uri("/thumb/d/a,w_5000.jpg")
        .header("host", "img.example.com:8443")
        .header("x-forwarded-proto", "https")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        location(&response),
        "https://img.example.com:8443/thumb/d/a,w_2000.jpg"
    );
}

#[tokio::test]
async fn test_redirect_through_front_script() {
    let deployment = Deployment::new();
    let router =
        deployment.router_with("", "", RouterConfig::new().with_script_name("/index.php"));

    let response = send(&router, get("/index.php/thumb/d/a,w_5000.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/index.php/thumb/d/a,w_2000.jpg"));
}

// =============================================================================
// After Opening the Source
// =============================================================================

#[tokio::test]
async fn test_no_stretch_clamps_to_source() {
    let deployment = Deployment::new();
    let router = deployment.router("allow_stretch = false");

    let response = send(&router, get("/thumb/d/a,w_1000.jpg")).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), url("/thumb/d/a,w_400.jpg"));

    let response = send(&router, get("/thumb/d/a,w_400.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_stretch_allowed_by_default() {
    let deployment = Deployment::new();
    let router = deployment.router("");

    let response = send(&router, get("/thumb/d/a,w_1000.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Thumber::canonical_url
// =============================================================================

#[test]
fn test_canonical_url_matches_redirect() {
    let deployment = Deployment::new();
    let settings = deployment.settings("", "allow_stretch = false");
    let thumber = Thumber::new(Arc::new(settings));

    let ctx = RequestContext::from_url(&url("/thumb/d/a,w_1000,q_100.jpg"), None).unwrap();
    assert_eq!(
        thumber.canonical_url(ctx).unwrap(),
        url("/thumb/d/a,w_400.jpg")
    );
}

#[test]
fn test_canonical_url_without_source() {
    let deployment = Deployment::new();
    let settings = deployment.settings("", "allow_stretch = false");
    let thumber = Thumber::new(Arc::new(settings));

    // Only the first pass applies when the source is missing
    let ctx = RequestContext::from_url(&url("/thumb/d/nope,w_5000.jpg"), None).unwrap();
    assert_eq!(
        thumber.canonical_url(ctx).unwrap(),
        url("/thumb/d/nope,w_2000.jpg")
    );
}
