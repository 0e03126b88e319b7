//! Test events.

use chrono::Utc;
use ingest_core::{
    CustomEvent, FileDownload, OutboundLinkClick, PageUri, PageView, ReferrerUri, Session,
};

pub fn page(path: &str) -> PageUri {
    PageUri::parse(&format!("https://example.com{}", path)).unwrap()
}

pub fn session() -> Session {
    Session::new(page("/"), ReferrerUri::direct(), "visitor_test")
}

/// Pageview producing version `count` of a session.
pub fn pageview(count: u16) -> PageView {
    let mut session = session();
    let (page_uri, referrer_uri) = if count == 1 {
        (page("/"), ReferrerUri::direct())
    } else {
        (page(&format!("/page-{}", count)), page("/previous").into())
    };
    session.page_uri = page_uri.clone();
    session.pageview_count = count;

    PageView {
        timestamp: Utc::now(),
        page_uri,
        referrer_uri,
        status: 200,
        session,
    }
}

pub fn custom_event(name: &str) -> CustomEvent {
    CustomEvent {
        timestamp: Utc::now(),
        page_uri: page("/"),
        session: session(),
        name: name.to_string(),
        keys: vec!["plan".to_string()],
        values: vec!["\"pro\"".to_string()],
    }
}

pub fn outbound_link_click() -> OutboundLinkClick {
    OutboundLinkClick {
        timestamp: Utc::now(),
        page_uri: page("/"),
        session: session(),
        link: PageUri::parse("https://github.com/").unwrap(),
    }
}

pub fn file_download() -> FileDownload {
    FileDownload {
        timestamp: Utc::now(),
        page_uri: page("/downloads"),
        session: session(),
        file_url: page("/files/report.pdf"),
    }
}
