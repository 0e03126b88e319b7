//! Session handling types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uri::{PageUri, ReferrerUri};
use crate::useragent::Client;

/// Country code used when no upstream geolocation is available.
pub const UNKNOWN_COUNTRY: &str = "XX";

/// UTM campaign parameters captured from the entry page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtmParams {
    pub source: String,
    pub medium: String,
    pub campaign: String,
    pub term: String,
    pub content: String,
}

impl UtmParams {
    /// Reads `utm_*` query parameters, falling back to `ref` for the source.
    pub fn from_uri(uri: &PageUri) -> Self {
        let param = |name: &str| uri.query_param(name).unwrap_or_default();
        Self {
            source: uri
                .query_param("utm_source")
                .or_else(|| uri.query_param("ref"))
                .unwrap_or_default(),
            medium: param("utm_medium"),
            campaign: param("utm_campaign"),
            term: param("utm_term"),
            content: param("utm_content"),
        }
    }
}

/// An ephemeral visitor session.
///
/// Sessions are indexed by the path they currently occupy (`page_uri`).
/// `pageview_count` doubles as the session version: a higher count
/// supersedes a lower one for the same `session_uuid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub visitor_id: String,
    /// UUIDv7, the embedded timestamp is the session start.
    pub session_uuid: Uuid,
    /// First page of the session.
    pub entry_uri: PageUri,
    /// Page currently occupied by the session.
    pub page_uri: PageUri,
    pub referrer_uri: ReferrerUri,
    pub client: Client,
    pub country_code: String,
    pub utm: UtmParams,
    pub pageview_count: u16,
}

impl Session {
    /// Creates the first version of a session entering at `page_uri`.
    pub fn new(page_uri: PageUri, referrer_uri: ReferrerUri, visitor_id: impl Into<String>) -> Self {
        Self {
            visitor_id: visitor_id.into(),
            session_uuid: Uuid::now_v7(),
            entry_uri: page_uri.clone(),
            utm: UtmParams::from_uri(&page_uri),
            page_uri,
            referrer_uri,
            client: Client::default(),
            country_code: UNKNOWN_COUNTRY.to_string(),
            pageview_count: 1,
        }
    }

    /// Path the session is currently indexed under.
    pub fn path(&self) -> &str {
        self.page_uri.path()
    }

    /// Session start, decoded from the v7 uuid.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.session_uuid
            .get_timestamp()
            .and_then(|ts| {
                let (secs, nanos) = ts.to_unix();
                DateTime::from_timestamp(secs as i64, nanos)
            })
            .unwrap_or(DateTime::UNIX_EPOCH)
    }

    /// Next version of this session after navigating to `page_uri`.
    ///
    /// Returns `None` once the pageview counter is exhausted.
    pub fn next_pageview(&self, page_uri: PageUri) -> Option<Self> {
        let pageview_count = self.pageview_count.checked_add(1)?;
        Some(Self {
            page_uri,
            pageview_count,
            ..self.clone()
        })
    }

    /// Copy of this session under a new uuid, for a second tab on the same
    /// page.
    pub fn duplicate(&self, page_uri: PageUri) -> Self {
        Self {
            session_uuid: Uuid::now_v7(),
            page_uri,
            ..self.clone()
        }
    }
}
