//! End-to-end tests for product share pages.
//!
//! Each test runs the real share router against an in-process fake record
//! store; see the crate docs for the fake catalog.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use reqwest::header::{CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE};
use xetivo_share::config::RecordStoreConfig;
use xetivo_share_integration_tests::{TEST_ANON_KEY, TEST_IMAGE_URL, TestApp};

/// Nonce from a `script-src 'nonce-...'` directive.
fn csp_nonce(csp: &str) -> Option<&str> {
    let start = csp.find("'nonce-")? + "'nonce-".len();
    let len = csp.get(start..)?.find('\'')?;
    csp.get(start..start + len)
}

// ============================================================================
// Successful lookups
// ============================================================================

#[tokio::test]
async fn test_product_page_renders_share_card() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/abc123").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/html"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("<title>Test Widget | Xetivo</title>"));
    assert!(body.contains(r#"<h1 class="share-card__name">Test Widget</h1>"#));
    assert!(body.contains(&format!(r#"src="{TEST_IMAGE_URL}""#)));
    assert!(body.contains(r#"alt="Test Widget""#));
    assert!(body.contains(r#"href="xetivo://product/abc123""#));
    assert!(body.contains("Open in Xetivo App"));
    // Description is hidden by default
    assert!(!body.contains("A very good widget."));
}

#[tokio::test]
async fn test_product_page_social_metadata() {
    let app = TestApp::spawn().await;

    let body = app.get("/product/abc123").await.text().await.unwrap();

    assert!(body.contains(r#"<meta property="og:title" content="Test Widget">"#));
    assert!(body.contains(&format!(
        r#"<meta property="og:image" content="{TEST_IMAGE_URL}">"#
    )));
    assert!(body.contains(
        r#"<meta property="og:url" content="https://share.test/product/abc123">"#
    ));
    assert!(body.contains(r#"<meta property="og:site_name" content="Xetivo">"#));
    assert!(body.contains(
        r#"<meta property="og:description" content="Check out this product on Xetivo.">"#
    ));
    assert!(body.contains(r#"<meta name="twitter:card" content="summary_large_image">"#));
    assert!(body.contains(r#"<link rel="canonical" href="https://share.test/product/abc123">"#));
}

#[tokio::test]
async fn test_product_page_redirect_script() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/abc123").await;
    let csp = resp.headers()[CONTENT_SECURITY_POLICY]
        .to_str()
        .unwrap()
        .to_string();
    let body = resp.text().await.unwrap();

    let nonce = csp_nonce(&csp).expect("CSP should carry a script nonce");
    assert!(body.contains(&format!(r#"<script nonce="{nonce}">"#)));
    assert!(body.contains(r#""app_uri":"xetivo://product/abc123""#));
    assert!(body.contains(r#""fallback_url":"https://share.test/product/abc123""#));
    assert!(body.contains(r#""delay_ms":1200"#));
    assert!(body.contains(r#""stale_after_ms":1500"#));
}

#[tokio::test]
async fn test_redirect_script_arbitration_rules() {
    let app = TestApp::spawn().await;

    let body = app.get("/product/abc123").await.text().await.unwrap();
    let start = body.find("<script").expect("page should carry the redirect script");
    let end = body[start..].find("</script>").unwrap() + start;
    let script = &body[start..end];

    // Armed once per page load
    assert!(script.contains("if (window.__xetivoRedirectArmed) {"));
    assert!(script.contains("window.__xetivoRedirectArmed = true;"));

    // A page reloaded by the fallback does not bounce back to the app
    assert!(script.contains(r#"var fallbackKey = "xetivo-share:fallback:" + plan.app_uri;"#));
    assert!(script.contains("if (window.sessionStorage.getItem(fallbackKey)) {"));
    assert!(script.contains(r#"window.sessionStorage.setItem(fallbackKey, "1");"#));

    // Hidden or unloaded page means the app took over
    assert!(script.contains(r#"document.addEventListener("visibilitychange""#));
    assert!(script.contains(r#"window.addEventListener("pagehide", markHandedOff);"#));

    // App first, then the timer decides
    assert!(script.contains("window.location.href = plan.app_uri;"));
    assert!(script.contains("}, plan.delay_ms);"));
    assert!(script.contains("if (handedOff || elapsed >= plan.stale_after_ms) {"));
    assert!(script.contains("window.location.replace(plan.fallback_url);"));

    // The marker is written before leaving, and the fallback is the last step
    let set_marker = script.find("sessionStorage.setItem").unwrap();
    let suppress = script.find("elapsed >= plan.stale_after_ms").unwrap();
    let fallback = script.find("location.replace(plan.fallback_url)").unwrap();
    assert!(suppress < set_marker && set_marker < fallback);
}

#[tokio::test]
async fn test_nonce_changes_per_request() {
    let app = TestApp::spawn().await;

    let first = app.get("/product/abc123").await;
    let second = app.get("/product/abc123").await;

    let nonce = |resp: &reqwest::Response| {
        let csp = resp.headers()[CONTENT_SECURITY_POLICY].to_str().unwrap();
        csp_nonce(csp).unwrap().to_string()
    };
    assert_ne!(nonce(&first), nonce(&second));
}

#[tokio::test]
async fn test_product_page_security_headers() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/abc123").await;
    let headers = resp.headers();

    let csp = headers[CONTENT_SECURITY_POLICY].to_str().unwrap();
    assert!(csp.contains("img-src 'self' https://cdn.example.com"));
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers[CACHE_CONTROL], "no-store, max-age=0");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_legacy_route_renders_same_page() {
    let app = TestApp::spawn().await;

    let resp = app.get("/abc123").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = resp.text().await.unwrap();
    assert!(body.contains("Test Widget"));
    // Canonical URL always uses the /product/ shape
    assert!(body.contains(r#"<link rel="canonical" href="https://share.test/product/abc123">"#));
}

#[tokio::test]
async fn test_missing_image_renders_placeholder() {
    let app = TestApp::spawn().await;

    let body = app.get("/product/noimg").await.text().await.unwrap();

    assert!(body.contains("share-card__placeholder"));
    assert!(!body.contains("<img"));
    assert!(!body.contains("og:image"));
    assert!(body.contains(r#"<meta name="twitter:card" content="summary">"#));
}

#[tokio::test]
async fn test_image_outside_allow_list_is_not_rendered() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/offsite").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body = resp.text().await.unwrap();
    assert!(body.contains("Offsite Thing"));
    assert!(!body.contains("evil.example.net"));
    assert!(body.contains("share-card__placeholder"));
}

// ============================================================================
// Display options
// ============================================================================

#[tokio::test]
async fn test_description_option_requests_and_renders_description() {
    let app = TestApp::spawn_with(|config| {
        config.page = config
            .page
            .show_description(true)
            .description_in_metadata(true);
    })
    .await;

    let body = app.get("/product/abc123").await.text().await.unwrap();
    assert!(body.contains(r#"<p class="share-card__description">A very good widget.</p>"#));
    assert!(body.contains(r#"<meta property="og:description" content="A very good widget.">"#));

    let requests = app.store.requests();
    assert_eq!(
        requests[0].select.as_deref(),
        Some("product_name,image_uri,description")
    );
}

#[tokio::test]
async fn test_auto_redirect_disabled_omits_script() {
    let app = TestApp::spawn_with(|config| {
        config.page = config.page.auto_redirect_to_app(false).show_app_button(false);
    })
    .await;

    let resp = app.get("/product/abc123").await;
    let csp = resp.headers()[CONTENT_SECURITY_POLICY]
        .to_str()
        .unwrap()
        .to_string();
    let body = resp.text().await.unwrap();

    assert!(!body.contains("<script"));
    assert!(!body.contains("Open in Xetivo App"));
    assert!(csp.contains("script-src"));
}

#[tokio::test]
async fn test_social_metadata_disabled() {
    let app = TestApp::spawn_with(|config| {
        config.page = config.page.emit_social_metadata(false);
    })
    .await;

    let body = app.get("/product/abc123").await.text().await.unwrap();
    assert!(!body.contains("og:title"));
    assert!(!body.contains("twitter:card"));
    assert!(body.contains("Test Widget"));
}

// ============================================================================
// Record store requests
// ============================================================================

#[tokio::test]
async fn test_lookup_sends_credentials_and_filter() {
    let app = TestApp::spawn().await;

    app.get("/product/abc123").await;

    let requests = app.store.requests();
    assert_eq!(requests.len(), 1);

    let request = &requests[0];
    assert_eq!(request.path, "/rest/v1/products");
    assert_eq!(request.product_id.as_deref(), Some("eq.abc123"));
    assert_eq!(request.select.as_deref(), Some("product_name,image_uri"));
    assert_eq!(request.apikey.as_deref(), Some(TEST_ANON_KEY));
    assert_eq!(
        request.authorization.as_deref(),
        Some(format!("Bearer {TEST_ANON_KEY}").as_str())
    );
    assert_eq!(request.cache_control.as_deref(), Some("no-cache"));
}

#[tokio::test]
async fn test_every_view_issues_a_fresh_lookup() {
    let app = TestApp::spawn().await;

    app.get("/product/abc123").await;
    app.get("/product/abc123").await;

    assert_eq!(app.store.request_count(), 2);
}

#[tokio::test]
async fn test_identifier_is_percent_encoded_in_lookup() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/a%26b").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let requests = app.store.requests();
    assert_eq!(requests.len(), 1);
    // The fake store sees the decoded value, so the filter was not split
    assert_eq!(requests[0].product_id.as_deref(), Some("eq.a&b"));
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/zzz").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let body = resp.text().await.unwrap();
    assert!(body.contains("Product not found"));
    assert!(!body.contains("<script"));
}

#[tokio::test]
async fn test_placeholder_identifier_skips_lookup() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/undefined").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(resp.text().await.unwrap().contains("Invalid product link"));

    assert_eq!(app.store.request_count(), 0);
}

#[tokio::test]
async fn test_undecodable_identifier_is_invalid_link() {
    let app = TestApp::spawn().await;

    for path in ["/product/%FF", "/%FF"] {
        let resp = app.get(path).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");

        let content_type = resp.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"), "{path}: {content_type}");

        let body = resp.text().await.unwrap();
        assert!(body.contains("Invalid product link"), "{path}");
        assert!(!body.contains("<script"), "{path}");
    }

    assert_eq!(app.store.request_count(), 0);
}

#[tokio::test]
async fn test_record_store_error_is_load_failure() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/boom").await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

    let body = resp.text().await.unwrap();
    assert!(body.contains("Failed to load product"));
    // Upstream details stay in the logs
    assert!(!body.contains("internal error"));
}

#[tokio::test]
async fn test_unparseable_response_is_load_failure() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/garbled").await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(!resp.text().await.unwrap().contains("maintenance"));
}

#[tokio::test]
async fn test_wrong_key_is_load_failure() {
    let app = TestApp::spawn_with(|config| {
        config.record_store.anon_key = Some("some-other-key".into());
    })
    .await;

    let resp = app.get("/product/abc123").await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_missing_configuration_is_server_error() {
    let app = TestApp::spawn_with(|config| {
        config.record_store = RecordStoreConfig::default();
    })
    .await;

    let resp = app.get("/product/abc123").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.text().await.unwrap().contains("Failed to load product"));
    assert_eq!(app.store.request_count(), 0);
}

#[tokio::test]
async fn test_unmatched_path_is_not_found() {
    let app = TestApp::spawn().await;

    let resp = app.get("/product/abc123/extra").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.store.request_count(), 0);
}
