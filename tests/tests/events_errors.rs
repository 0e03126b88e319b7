//! Error handling tests for the event endpoints.

use api::extractors::REFERRER_HEADER;
use api::ApiConfig;
use axum::http::StatusCode;
use integration_tests::fixtures::{self, page, BOT_UA, FIREFOX_UA};
use integration_tests::setup::{test_eventstore_config, wait_until, TestContext};
use std::time::Duration;

fn assert_error(response: &axum_test::TestResponse, status: StatusCode, code: &str) {
    assert_eq!(response.status_code(), status);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], code, "unexpected body: {}", body);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_custom_event_without_session_returns_400() {
    let ctx = TestContext::new().await;

    let response = ctx.custom_event(&page("/"), "signup", serde_json::json!({})).await;

    assert_error(&response, StatusCode::BAD_REQUEST, "SESSION_001");
    assert_eq!(ctx.backend.row_count(), 0);
}

#[tokio::test]
async fn test_identify_without_session_returns_400() {
    let ctx = TestContext::new().await;

    let response = ctx.identify(&page("/"), "user-1").await;

    assert_error(&response, StatusCode::BAD_REQUEST, "SESSION_001");
}

#[tokio::test]
async fn test_bot_pageview_filtered() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post(fixtures::PAGEVIEWS)
        .add_header("User-Agent", BOT_UA)
        .add_header(REFERRER_HEADER, &page("/"))
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_004");
    assert_eq!(ctx.sessions.device_count(), 0);
}

#[tokio::test]
async fn test_internal_outbound_link_filtered() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    let response = ctx.outbound_link(&page("/"), &page("/pricing")).await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_004");
}

#[tokio::test]
async fn test_missing_referrer_returns_400() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post(fixtures::PAGEVIEWS)
        .add_header("User-Agent", FIREFOX_UA)
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_002");
}

#[tokio::test]
async fn test_invalid_referrer_returns_400() {
    let ctx = TestContext::new().await;

    let response = ctx.pageview("not a url", None).await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_002");
}

#[tokio::test]
async fn test_invalid_outbound_link_returns_400() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    let response = ctx.outbound_link(&page("/"), "javascript void").await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_002");
}

#[tokio::test]
async fn test_invalid_event_name_returns_400() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    let response = ctx.custom_event(&page("/"), "sign.up", serde_json::json!({})).await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_003");
}

#[tokio::test]
async fn test_non_object_properties_return_400() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    let response = ctx.custom_event(&page("/"), "signup", serde_json::json!([1, 2, 3])).await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_001");
}

#[tokio::test]
async fn test_invalid_status_header_returns_400() {
    let ctx = TestContext::new().await;

    let response = ctx
        .server
        .post(fixtures::PAGEVIEWS)
        .add_header("User-Agent", FIREFOX_UA)
        .add_header(REFERRER_HEADER, &page("/"))
        .add_header("X-Analytics-Status", "ok")
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALID_001");
}

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let api = ApiConfig {
        request_timeout_ms: 500,
        rate_limit_per_sec: 1,
        rate_limit_burst: 2,
    };
    let ctx = TestContext::with_config(api, test_eventstore_config());

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    ctx.pageview(&page("/about"), None).await.assert_status_ok();

    let response = ctx.pageview(&page("/contact"), None).await;
    assert_error(&response, StatusCode::TOO_MANY_REQUESTS, "RATE_001");
    assert!(response.headers().get("Retry-After").is_some());

    // Health endpoints are not rate limited.
    ctx.server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn test_backend_failure_does_not_fail_request() {
    let ctx = TestContext::new().await;
    ctx.backend.set_should_fail(true);

    ctx.pageview(&page("/"), None).await.assert_status_ok();

    // Default of five attempts with a 10ms linear backoff.
    wait_until(|| ctx.backend.insert_attempts() >= 5).await;
    assert_eq!(ctx.backend.insert_attempts(), 5);
    assert_eq!(ctx.backend.row_count(), 0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let metrics = ctx.server.get("/metrics").await.text();
    assert!(metrics.contains("eventstore_batch_dropped_total{type=\"pageview\"} 1"));
}
