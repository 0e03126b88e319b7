//! Analytics events.
//!
//! Every event carries a snapshot of the session it was correlated with.
//! The event store turns them into backend rows.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Error, Result, ValidationErrorCode};
use crate::session::Session;
use crate::uri::{PageUri, ReferrerUri};

static EVENT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid event name regex"));

/// Kind of a stored event. Each kind has its own ring buffer and batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Pageview,
    Custom,
    OutboundLinkClick,
    FileDownload,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Pageview,
        EventKind::Custom,
        EventKind::OutboundLinkClick,
        EventKind::FileDownload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pageview => "pageview",
            Self::Custom => "custom",
            Self::OutboundLinkClick => "outbound_link_click",
            Self::FileDownload => "file_download",
        }
    }

    /// Position in [`EventKind::ALL`].
    pub fn index(&self) -> usize {
        match self {
            Self::Pageview => 0,
            Self::Custom => 1,
            Self::OutboundLinkClick => 2,
            Self::FileDownload => 3,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A page view. `session.pageview_count` is the session version it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub timestamp: DateTime<Utc>,
    pub page_uri: PageUri,
    /// Document referrer; for continued sessions the page navigated from.
    pub referrer_uri: ReferrerUri,
    /// HTTP status of the viewed page.
    pub status: u16,
    pub session: Session,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomEvent {
    pub timestamp: DateTime<Utc>,
    pub page_uri: PageUri,
    pub session: Session,
    pub name: String,
    pub keys: Vec<String>,
    /// JSON encoded values, parallel to `keys`.
    pub values: Vec<String>,
}

impl CustomEvent {
    pub fn validate_name(name: &str) -> Result<()> {
        if EVENT_NAME_RE.is_match(name) {
            Ok(())
        } else {
            Err(Error::validation(
                ValidationErrorCode::InvalidEventName,
                format!("invalid event name: {:?}", name),
            ))
        }
    }

    /// Splits a JSON object into parallel key and JSON-encoded value arrays.
    pub fn flatten_properties(
        properties: &serde_json::Map<String, serde_json::Value>,
    ) -> (Vec<String>, Vec<String>) {
        properties
            .iter()
            .map(|(key, value)| (key.clone(), value.to_string()))
            .unzip()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundLinkClick {
    pub timestamp: DateTime<Utc>,
    pub page_uri: PageUri,
    pub session: Session,
    pub link: PageUri,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileDownload {
    pub timestamp: DateTime<Utc>,
    pub page_uri: PageUri,
    pub session: Session,
    pub file_url: PageUri,
}
