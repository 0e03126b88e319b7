//! Backend rows produced from events.
//!
//! Sessions are stored as versioned rows: every pageview of a continued
//! session cancels the previous version (`sign = -1`) and writes the new one
//! (`sign = 1`), so a collapsing table keeps exactly one row per session.

use chrono::{DateTime, Utc};
use ingest_core::{CustomEvent, EventKind, FileDownload, OutboundLinkClick, PageView, Session};
use serde::Serialize;
use uuid::Uuid;

/// Table receiving the rows of an event kind.
pub fn table_name(kind: EventKind) -> &'static str {
    match kind {
        EventKind::Pageview => "sessions",
        EventKind::Custom => "events_custom",
        EventKind::OutboundLinkClick => "outbound_link_clicks",
        EventKind::FileDownload => "file_downloads",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRow {
    pub domain: String,
    pub entry_path: String,
    pub exit_timestamp: DateTime<Utc>,
    pub exit_path: String,
    pub visitor_id: String,
    pub session_uuid: Uuid,
    pub operating_system: String,
    pub browser_family: String,
    pub device: String,
    pub referrer_domain: String,
    pub country_code: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_term: String,
    pub utm_content: String,
    pub exit_status: u16,
    pub version: u16,
    pub sign: i8,
}

impl SessionRow {
    fn new(pageview: &PageView, exit_path: &str, version: u16, sign: i8) -> Self {
        let session = &pageview.session;
        Self {
            domain: session.entry_uri.host().to_string(),
            entry_path: session.entry_uri.path().to_string(),
            exit_timestamp: pageview.timestamp,
            exit_path: exit_path.to_string(),
            visitor_id: session.visitor_id.clone(),
            session_uuid: session.session_uuid,
            operating_system: session.client.operating_system.clone(),
            browser_family: session.client.browser_family.clone(),
            device: session.client.device.clone(),
            referrer_domain: session.referrer_uri.host_or_direct().to_string(),
            country_code: session.country_code.clone(),
            utm_source: session.utm.source.clone(),
            utm_medium: session.utm.medium.clone(),
            utm_campaign: session.utm.campaign.clone(),
            utm_term: session.utm.term.clone(),
            utm_content: session.utm.content.clone(),
            exit_status: pageview.status,
            version,
            sign,
        }
    }
}

/// Columns shared by the session-scoped event tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventContext {
    pub timestamp: DateTime<Utc>,
    pub domain: String,
    pub path: String,
    pub visitor_id: String,
    pub session_uuid: Uuid,
}

impl EventContext {
    fn new(timestamp: DateTime<Utc>, page: &ingest_core::PageUri, session: &Session) -> Self {
        Self {
            timestamp,
            domain: page.host().to_string(),
            path: page.path().to_string(),
            visitor_id: session.visitor_id.clone(),
            session_uuid: session.session_uuid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomEventRow {
    #[serde(flatten)]
    pub context: EventContext,
    pub name: String,
    pub keys: Vec<String>,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundLinkClickRow {
    #[serde(flatten)]
    pub context: EventContext,
    pub link: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDownloadRow {
    #[serde(flatten)]
    pub context: EventContext,
    pub url: String,
}

/// Rows of one kind, sent to the backend in a single insert.
#[derive(Debug, Clone, PartialEq)]
pub enum RowBatch {
    Sessions(Vec<SessionRow>),
    CustomEvents(Vec<CustomEventRow>),
    OutboundLinkClicks(Vec<OutboundLinkClickRow>),
    FileDownloads(Vec<FileDownloadRow>),
}

impl RowBatch {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Sessions(_) => EventKind::Pageview,
            Self::CustomEvents(_) => EventKind::Custom,
            Self::OutboundLinkClicks(_) => EventKind::OutboundLinkClick,
            Self::FileDownloads(_) => EventKind::FileDownload,
        }
    }

    pub fn table(&self) -> &'static str {
        table_name(self.kind())
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Sessions(rows) => rows.len(),
            Self::CustomEvents(rows) => rows.len(),
            Self::OutboundLinkClicks(rows) => rows.len(),
            Self::FileDownloads(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A row type that can be wrapped into a [`RowBatch`].
pub trait BatchRow: Sized + Send + Sync + 'static {
    fn into_batch(rows: Vec<Self>) -> RowBatch;
}

impl BatchRow for SessionRow {
    fn into_batch(rows: Vec<Self>) -> RowBatch {
        RowBatch::Sessions(rows)
    }
}

impl BatchRow for CustomEventRow {
    fn into_batch(rows: Vec<Self>) -> RowBatch {
        RowBatch::CustomEvents(rows)
    }
}

impl BatchRow for OutboundLinkClickRow {
    fn into_batch(rows: Vec<Self>) -> RowBatch {
        RowBatch::OutboundLinkClicks(rows)
    }
}

impl BatchRow for FileDownloadRow {
    fn into_batch(rows: Vec<Self>) -> RowBatch {
        RowBatch::FileDownloads(rows)
    }
}

/// An event that is stored as one or more rows of a single kind.
pub trait EmitRows: Send + 'static {
    type Row: BatchRow;
    const KIND: EventKind;

    fn emit_rows(&self, out: &mut Vec<Self::Row>);
}

impl EmitRows for PageView {
    type Row = SessionRow;
    const KIND: EventKind = EventKind::Pageview;

    fn emit_rows(&self, out: &mut Vec<SessionRow>) {
        let version = self.session.pageview_count;
        if version > 1 {
            let previous_path = self
                .referrer_uri
                .path()
                .unwrap_or_else(|| self.session.entry_uri.path());
            out.push(SessionRow::new(self, previous_path, version - 1, -1));
        }
        out.push(SessionRow::new(self, self.page_uri.path(), version, 1));
    }
}

impl EmitRows for CustomEvent {
    type Row = CustomEventRow;
    const KIND: EventKind = EventKind::Custom;

    fn emit_rows(&self, out: &mut Vec<CustomEventRow>) {
        out.push(CustomEventRow {
            context: EventContext::new(self.timestamp, &self.page_uri, &self.session),
            name: self.name.clone(),
            keys: self.keys.clone(),
            values: self.values.clone(),
        });
    }
}

impl EmitRows for OutboundLinkClick {
    type Row = OutboundLinkClickRow;
    const KIND: EventKind = EventKind::OutboundLinkClick;

    fn emit_rows(&self, out: &mut Vec<OutboundLinkClickRow>) {
        out.push(OutboundLinkClickRow {
            context: EventContext::new(self.timestamp, &self.page_uri, &self.session),
            link: self.link.to_string(),
        });
    }
}

impl EmitRows for FileDownload {
    type Row = FileDownloadRow;
    const KIND: EventKind = EventKind::FileDownload;

    fn emit_rows(&self, out: &mut Vec<FileDownloadRow>) {
        out.push(FileDownloadRow {
            context: EventContext::new(self.timestamp, &self.page_uri, &self.session),
            url: self.file_url.to_string(),
        });
    }
}
