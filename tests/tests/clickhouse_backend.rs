//! Storage tests against a real ClickHouse server.
//!
//! Requires Docker to be running for testcontainers, or
//! `INGESTION_TEST_CLICKHOUSE_URL` pointing at a server.

use api::extractors::REFERRER_HEADER;
use axum_test::TestResponse;
use clickhouse_backend::{count_rows, count_sessions};
use integration_tests::fixtures::{self, page, FIREFOX_UA};
use integration_tests::setup::ClickHouseTestContext;

async fn pageview(ctx: &ClickHouseTestContext, url: &str, document_referrer: &str) -> TestResponse {
    ctx.server
        .post(fixtures::PAGEVIEWS)
        .add_header("User-Agent", FIREFOX_UA)
        .add_header("X-Forwarded-For", &fixtures::client_ip(9))
        .add_header(REFERRER_HEADER, url)
        .add_header("X-Analytics-Document-Referrer", document_referrer)
        .await
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sessions_collapse_to_one_row() {
    let ctx = ClickHouseTestContext::new().await;

    pageview(&ctx, &page("/"), "https://news.ycombinator.com/").await.assert_status_ok();
    pageview(&ctx, &page("/pricing"), &page("/")).await.assert_status_ok();
    pageview(&ctx, &page("/signup"), &page("/pricing")).await.assert_status_ok();

    // Sends whatever is still buffered.
    ctx.events.shutdown().await;

    // Background merges may already have collapsed cancelled versions.
    assert_eq!(count_sessions(&ctx.client).await.unwrap(), 1);
    assert_eq!(count_rows(&ctx.client, "pageviews").await.unwrap(), 3);

    let row = ctx
        .events
        .query_row("SELECT entry_path, exit_path FROM sessions FINAL")
        .await
        .unwrap()
        .expect("one session");
    assert_eq!(row["entry_path"], "/");
    assert_eq!(row["exit_path"], "/signup");
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_events_stored_per_table() {
    let ctx = ClickHouseTestContext::new().await;

    pageview(&ctx, &page("/"), "").await.assert_status_ok();

    ctx.server
        .post(&fixtures::custom_event("signup"))
        .add_header("User-Agent", FIREFOX_UA)
        .add_header("X-Forwarded-For", &fixtures::client_ip(9))
        .add_header(REFERRER_HEADER, &page("/"))
        .json(&serde_json::json!({ "plan": "pro" }))
        .await
        .assert_status_ok();

    ctx.server
        .post(fixtures::OUTBOUND_LINKS)
        .add_header("User-Agent", FIREFOX_UA)
        .add_header("X-Forwarded-For", &fixtures::client_ip(9))
        .add_header(REFERRER_HEADER, &page("/"))
        .text("https://github.com/rust-lang/rust")
        .await
        .assert_status_ok();

    ctx.server
        .post(fixtures::FILE_DOWNLOADS)
        .add_header("User-Agent", FIREFOX_UA)
        .add_header("X-Forwarded-For", &fixtures::client_ip(9))
        .add_header(REFERRER_HEADER, &page("/"))
        .text(page("/files/guide.pdf"))
        .await
        .assert_status_ok();

    ctx.events.shutdown().await;

    for table in ["sessions", "events_custom", "outbound_link_clicks", "file_downloads"] {
        assert_eq!(count_rows(&ctx.client, table).await.unwrap(), 1, "{}", table);
    }

    let event = ctx
        .events
        .query_row("SELECT name, keys, values FROM events_custom")
        .await
        .unwrap()
        .expect("custom event row");
    assert_eq!(event["name"], "signup");
    assert_eq!(event["keys"], serde_json::json!(["plan"]));
    assert_eq!(event["values"], serde_json::json!(["\"pro\""]));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_query_rejects_writes() {
    let ctx = ClickHouseTestContext::new().await;

    let err = ctx.events.query("DROP TABLE sessions").await.unwrap_err();
    assert!(err.is_read_only());

    assert_eq!(count_rows(&ctx.client, "sessions").await.unwrap(), 0);
}
