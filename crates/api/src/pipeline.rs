//! Correlates incoming events with visitor sessions.
//!
//! Pageviews create or advance sessions. Every other event attaches to the
//! session currently on its page, waiting for it when the pageview that
//! creates it has not been processed yet.

use chrono::Utc;
use ingest_core::{
    device_id, visitor_id, Client, CustomEvent, DeviceId, Error, FileDownload, OutboundLinkClick,
    PageUri, PageView, ReferrerUri, Result, Session, UtmParams,
};
use serde_json::{Map, Value};
use sessionstore::PageviewMatch;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::extractors::ClientInfo;
use crate::state::AppState;

/// What happened to a pageview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageviewOutcome {
    /// Continued an existing session.
    Continued,
    /// Started a new session.
    Started,
    /// A session already occupies the page (reload or duplicated tab). A
    /// copy was inserted and nothing was stored.
    Duplicate,
}

/// Per-request inputs shared by all event kinds.
#[derive(Debug, Clone)]
pub struct EventRequest {
    pub client: ClientInfo,
    pub page: PageUri,
    pub deadline: Instant,
}

impl EventRequest {
    pub fn new(state: &AppState, client: ClientInfo, page: PageUri) -> Self {
        Self {
            client,
            page,
            deadline: Instant::now() + state.config.request_timeout(),
        }
    }

    fn device(&self, state: &AppState) -> DeviceId {
        device_id(
            &state.salts.static_salt(),
            &self.client.user_agent,
            &self.client.ip,
            self.page.host(),
        )
    }

    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

pub async fn pageview(
    state: &AppState,
    request: &EventRequest,
    referrer: ReferrerUri,
    status: u16,
    provided_visitor_id: Option<String>,
) -> Result<PageviewOutcome> {
    let device = request.device(state);
    let page = &request.page;
    let internal = referrer.host() == Some(page.host());

    let candidate = if internal {
        match state.sessions.add_pageview(device, &referrer, page) {
            PageviewMatch::Found(mut session) => {
                if let Some(id) = provided_visitor_id.filter(|id| *id != session.visitor_id) {
                    session = state
                        .sessions
                        .identify_session(device, page, id)
                        .ok_or_else(|| Error::internal("continued session vanished before identify"))?;
                }

                state.events.store_pageview(PageView {
                    timestamp: Utc::now(),
                    page_uri: page.clone(),
                    referrer_uri: referrer,
                    status,
                    session,
                });
                return Ok(PageviewOutcome::Continued);
            }
            PageviewMatch::Missing(candidate) => {
                if duplicate_session(state, device, page) {
                    return Ok(PageviewOutcome::Duplicate);
                }
                candidate
            }
        }
    } else {
        Session::new(page.clone(), referrer.clone(), String::new())
    };

    let client = Client::parse(&request.client.user_agent);
    if client.is_bot {
        return Err(Error::filtered("bot session filtered"));
    }

    if !internal && duplicate_session(state, device, page) {
        return Ok(PageviewOutcome::Duplicate);
    }

    let mut session = candidate;
    session.client = client;
    session.country_code = request.client.country_code.clone();
    session.utm = UtmParams::from_uri(page);
    session.visitor_id =
        provided_visitor_id.unwrap_or_else(|| visitor_id(&state.salts.daily(), device));

    if !state.sessions.insert_session(device, session.clone()) {
        warn!(device_id = %device, "Session limit reached, session not tracked");
    }

    state.events.store_pageview(PageView {
        timestamp: session.started_at(),
        page_uri: page.clone(),
        referrer_uri: referrer,
        status,
        session,
    });
    Ok(PageviewOutcome::Started)
}

/// Gives a reloaded or duplicated tab its own copy of the session already
/// on the page. The copy is stored with its next pageview.
fn duplicate_session(state: &AppState, device: DeviceId, page: &PageUri) -> bool {
    let Some(session) = state.sessions.get_session(device, page) else {
        return false;
    };

    let copy = session.duplicate(page.clone());
    debug!(
        device_id = %device,
        path = page.path(),
        session_uuid = %copy.session_uuid,
        "Duplicated session already on page"
    );
    if !state.sessions.insert_session(device, copy) {
        warn!(device_id = %device, "Session limit reached, duplicated session not tracked");
    }
    true
}

/// Session on the request's page, waiting until the request deadline.
async fn wait_session(state: &AppState, device: DeviceId, page: &PageUri, remaining: Duration) -> Option<Session> {
    state.sessions.wait_session(device, page, remaining).await
}

/// Session on the page or, failing that, on the root of its site.
///
/// Link clicks may only carry the origin of the page in their referrer.
async fn wait_session_or_root(state: &AppState, request: &EventRequest) -> Option<(PageUri, Session)> {
    let device = request.device(state);

    if let Some(session) = wait_session(state, device, &request.page, request.remaining()).await {
        return Some((request.page.clone(), session));
    }

    let root = request.page.root();
    if root.path() == request.page.path() {
        return None;
    }
    state
        .sessions
        .get_session(device, &root)
        .map(|session| (root, session))
}

pub async fn custom_event(
    state: &AppState,
    request: &EventRequest,
    name: &str,
    properties: &Map<String, Value>,
) -> Result<()> {
    CustomEvent::validate_name(name)?;

    let device = request.device(state);
    let session = wait_session(state, device, &request.page, request.remaining())
        .await
        .ok_or(Error::SessionNotFound)?;

    let (keys, values) = CustomEvent::flatten_properties(properties);
    state.events.store_custom_event(CustomEvent {
        timestamp: Utc::now(),
        page_uri: request.page.clone(),
        session,
        name: name.to_string(),
        keys,
        values,
    });
    Ok(())
}

pub async fn outbound_link_click(state: &AppState, request: &EventRequest, link: PageUri) -> Result<()> {
    if link.host() == request.page.host() {
        return Err(Error::filtered("internal link"));
    }

    let (page_uri, session) = wait_session_or_root(state, request)
        .await
        .ok_or(Error::SessionNotFound)?;

    state.events.store_outbound_link_click(OutboundLinkClick {
        timestamp: Utc::now(),
        page_uri,
        session,
        link,
    });
    Ok(())
}

pub async fn file_download(state: &AppState, request: &EventRequest, file_url: PageUri) -> Result<()> {
    let (page_uri, session) = wait_session_or_root(state, request)
        .await
        .ok_or(Error::SessionNotFound)?;

    state.events.store_file_download(FileDownload {
        timestamp: Utc::now(),
        page_uri,
        session,
        file_url,
    });
    Ok(())
}

/// Assigns `visitor_id` to the session on the page, or checks that one
/// exists when no id is given.
pub async fn identify(state: &AppState, request: &EventRequest, visitor_id: Option<String>) -> Result<Session> {
    let device = request.device(state);
    let page = &request.page;

    let Some(visitor_id) = visitor_id else {
        return wait_session(state, device, page, request.remaining())
            .await
            .ok_or(Error::SessionNotFound);
    };

    if let Some(session) = state.sessions.identify_session(device, page, visitor_id.clone()) {
        return Ok(session);
    }

    wait_session(state, device, page, request.remaining())
        .await
        .ok_or(Error::SessionNotFound)?;
    state
        .sessions
        .identify_session(device, page, visitor_id)
        .ok_or(Error::SessionNotFound)
}
