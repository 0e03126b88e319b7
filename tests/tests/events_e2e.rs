//! End-to-end tests for event ingestion.
//!
//! These run the real router, session store and event store against a
//! backend that captures the inserted batches.

use integration_tests::fixtures::page;
use integration_tests::setup::TestContext;
use std::time::Duration;

#[tokio::test]
async fn test_pageview_starts_session() {
    let ctx = TestContext::new().await;

    let response = ctx.pageview(&page("/"), Some("https://duckduckgo.com/")).await;
    response.assert_status_ok();
    assert!(response.text().is_empty());

    assert_eq!(ctx.wait_for_rows(1).await, 1);
    let sessions = ctx.backend.sessions();
    let row = &sessions[0];
    assert_eq!(row.domain, "www.example.com");
    assert_eq!(row.entry_path, "/");
    assert_eq!(row.exit_path, "/");
    assert_eq!(row.referrer_domain, "duckduckgo.com");
    assert_eq!(row.browser_family, "Firefox");
    assert_eq!(row.country_code, "XX");
    assert_eq!(row.exit_status, 200);
    assert_eq!((row.version, row.sign), (1, 1));
    assert!(row.visitor_id.starts_with("visitor_"));
}

#[tokio::test]
async fn test_internal_navigation_collapses_previous_row() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    ctx.pageview(&page("/pricing"), Some(&page("/"))).await.assert_status_ok();

    assert_eq!(ctx.wait_for_rows(3).await, 3);
    let sessions = ctx.backend.sessions();

    let first = &sessions[0];
    assert_eq!((first.version, first.sign), (1, 1));

    let cancel = sessions.iter().find(|row| row.sign == -1).expect("cancel row");
    assert_eq!(cancel.version, 1);
    assert_eq!(cancel.session_uuid, first.session_uuid);

    let current = sessions
        .iter()
        .find(|row| row.sign == 1 && row.version == 2)
        .expect("new version row");
    assert_eq!(current.session_uuid, first.session_uuid);
    assert_eq!(current.entry_path, "/");
    assert_eq!(current.exit_path, "/pricing");
    assert_eq!(current.visitor_id, first.visitor_id);
}

#[tokio::test]
async fn test_duplicated_tab_continues_its_own_session() {
    let ctx = TestContext::new().await;
    let root = page("/");
    let a = page("/a");

    ctx.pageview(&root, None).await.assert_status_ok();
    ctx.pageview(&a, Some(&root)).await.assert_status_ok();
    assert_eq!(ctx.wait_for_rows(3).await, 3);

    // Second tab replays the same navigation, the session has already moved to /a.
    ctx.pageview(&a, Some(&root)).await.assert_status_ok();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(ctx.backend.row_count(), 3);

    // Both tabs navigate on from /a.
    ctx.pageview(&page("/c"), Some(&a)).await.assert_status_ok();
    ctx.pageview(&page("/b"), Some(&a)).await.assert_status_ok();
    assert_eq!(ctx.wait_for_rows(7).await, 7);

    let sessions = ctx.backend.sessions();
    let original = sessions[0].session_uuid;
    assert!(sessions.iter().all(|row| row.entry_path == "/"));
    assert_eq!(sessions.iter().filter(|row| row.version == 1 && row.sign == 1).count(), 1);

    let mut latest: Vec<_> = sessions
        .iter()
        .filter(|row| row.version == 3 && row.sign == 1)
        .map(|row| (row.exit_path.as_str(), row.session_uuid))
        .collect();
    latest.sort();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].0, "/b");
    assert_eq!(latest[1].0, "/c");
    assert_ne!(latest[0].1, latest[1].1);
    assert!(latest.iter().any(|(_, uuid)| *uuid == original));
}

#[tokio::test]
async fn test_reload_from_external_referrer_reuses_session() {
    let ctx = TestContext::new().await;
    let root = page("/");

    ctx.pageview(&root, None).await.assert_status_ok();
    assert_eq!(ctx.wait_for_rows(1).await, 1);

    ctx.pageview(&root, None).await.assert_status_ok();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(ctx.backend.row_count(), 1);

    // Each copy of the session can be continued once.
    ctx.pageview(&page("/a"), Some(&root)).await.assert_status_ok();
    ctx.pageview(&page("/a"), Some(&root)).await.assert_status_ok();
    assert_eq!(ctx.wait_for_rows(5).await, 5);

    let sessions = ctx.backend.sessions();
    let continued: Vec<_> = sessions
        .iter()
        .filter(|row| row.version == 2 && row.sign == 1)
        .collect();
    assert_eq!(continued.len(), 2);
    assert_ne!(continued[0].session_uuid, continued[1].session_uuid);
    assert!(continued.iter().all(|row| row.entry_path == "/" && row.exit_path == "/a"));
}

#[tokio::test]
async fn test_custom_event_attaches_to_session() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/signup"), None).await.assert_status_ok();
    ctx.custom_event(&page("/signup"), "signup", serde_json::json!({ "plan": "pro", "seats": 3 }))
        .await
        .assert_status_ok();

    assert_eq!(ctx.wait_for_rows(2).await, 2);
    let session = &ctx.backend.sessions()[0];
    let events = ctx.backend.custom_events();
    assert_eq!(events.len(), 1);

    let event = &events[0];
    assert_eq!(event.name, "signup");
    assert_eq!(event.context.path, "/signup");
    assert_eq!(event.context.session_uuid, session.session_uuid);
    assert_eq!(event.context.visitor_id, session.visitor_id);

    let mut properties: Vec<_> = event.keys.iter().zip(&event.values).collect();
    properties.sort();
    assert_eq!(
        properties,
        vec![(&"plan".to_string(), &"\"pro\"".to_string()), (&"seats".to_string(), &"3".to_string())]
    );
}

#[tokio::test]
async fn test_custom_event_waits_for_late_pageview() {
    let ctx = TestContext::new().await;
    let root = page("/");

    let (event, pageview) = tokio::join!(
        ctx.custom_event(&root, "hero_click", serde_json::json!({})),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            ctx.pageview(&page("/"), None).await
        }
    );
    pageview.assert_status_ok();
    event.assert_status_ok();

    assert_eq!(ctx.wait_for_rows(2).await, 2);
    let events = ctx.backend.custom_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].context.session_uuid, ctx.backend.sessions()[0].session_uuid);
}

#[tokio::test]
async fn test_outbound_link_click_stored() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/blog"), None).await.assert_status_ok();
    ctx.outbound_link(&page("/blog"), "https://github.com/rust-lang/rust")
        .await
        .assert_status_ok();

    assert_eq!(ctx.wait_for_rows(2).await, 2);
    let clicks = ctx.backend.outbound_link_clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].link, "https://github.com/rust-lang/rust");
    assert_eq!(clicks[0].context.path, "/blog");
}

#[tokio::test]
async fn test_outbound_link_falls_back_to_site_root() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    ctx.outbound_link(&page("/docs"), "https://docs.rs/tokio")
        .await
        .assert_status_ok();

    assert_eq!(ctx.wait_for_rows(2).await, 2);
    let clicks = ctx.backend.outbound_link_clicks();
    assert_eq!(clicks.len(), 1);
    assert_eq!(clicks[0].context.path, "/");
}

#[tokio::test]
async fn test_file_download_stored() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/reports"), None).await.assert_status_ok();
    ctx.file_download(&page("/reports"), &page("/files/report-2024.pdf"))
        .await
        .assert_status_ok();

    assert_eq!(ctx.wait_for_rows(2).await, 2);
    let downloads = ctx.backend.file_downloads();
    assert_eq!(downloads.len(), 1);
    assert_eq!(downloads[0].url, "https://www.example.com/files/report-2024.pdf");
    assert_eq!(downloads[0].context.path, "/reports");
}

#[tokio::test]
async fn test_identify_sets_visitor_id() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/account"), None).await.assert_status_ok();
    ctx.identify(&page("/account"), "user-42").await.assert_status_ok();
    ctx.custom_event(&page("/account"), "upgrade", serde_json::json!({}))
        .await
        .assert_status_ok();

    assert_eq!(ctx.wait_for_rows(2).await, 2);
    let events = ctx.backend.custom_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].context.visitor_id, "user-42");
    assert_eq!(events[0].context.session_uuid, ctx.backend.sessions()[0].session_uuid);
}

#[tokio::test]
async fn test_distinct_clients_get_distinct_sessions() {
    let ctx = TestContext::new().await;

    ctx.pageview(&page("/"), None).await.assert_status_ok();
    ctx.server
        .post(integration_tests::fixtures::PAGEVIEWS)
        .add_header("User-Agent", integration_tests::fixtures::CHROME_UA)
        .add_header("X-Forwarded-For", &integration_tests::fixtures::client_ip(2))
        .add_header(api::extractors::REFERRER_HEADER, &page("/"))
        .await
        .assert_status_ok();

    assert_eq!(ctx.wait_for_rows(2).await, 2);
    let sessions = ctx.backend.sessions();
    assert_ne!(sessions[0].session_uuid, sessions[1].session_uuid);
    assert_ne!(sessions[0].visitor_id, sessions[1].visitor_id);
}
