//! ClickHouse table schemas.
//!
//! Tables are created in the client's database, so names are unqualified.
//! Timestamps are DateTime64(3) written as milliseconds.

/// Sessions, one row per pageview.
///
/// Each pageview of a continued session inserts a cancel row for the
/// previous version (`sign = -1`) and the new version (`sign = 1`).
/// Merges collapse pairs on `(domain, session_uuid, version)`.
pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    domain LowCardinality(String),
    entry_path String,
    exit_timestamp DateTime64(3, 'UTC'),
    exit_path String,
    visitor_id String,
    session_uuid String,

    operating_system LowCardinality(String),
    browser_family LowCardinality(String),
    device LowCardinality(String),
    referrer_domain String,
    country_code LowCardinality(String),

    utm_source String,
    utm_medium String,
    utm_campaign String,
    utm_term String,
    utm_content String,

    exit_status UInt16,
    version UInt16,
    sign Int8
)
ENGINE = VersionedCollapsingMergeTree(sign, version)
ORDER BY (domain, session_uuid)
SETTINGS index_granularity = 8192
"#;

/// Pageviews, derived from the positive session rows.
pub const CREATE_PAGEVIEWS_VIEW: &str = r#"
CREATE MATERIALIZED VIEW IF NOT EXISTS pageviews
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (domain, timestamp, session_uuid)
AS SELECT
    exit_timestamp AS timestamp,
    domain,
    exit_path AS path,
    visitor_id,
    session_uuid,
    referrer_domain,
    country_code,
    exit_status AS status,
    version AS pageview_number
FROM sessions
WHERE sign = 1
"#;

pub const CREATE_EVENTS_CUSTOM_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events_custom (
    timestamp DateTime64(3, 'UTC'),
    domain LowCardinality(String),
    path String,
    visitor_id String,
    session_uuid String,
    name String,
    keys Array(String),
    values Array(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (domain, name, timestamp)
SETTINGS index_granularity = 8192
"#;

pub const CREATE_OUTBOUND_LINK_CLICKS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS outbound_link_clicks (
    timestamp DateTime64(3, 'UTC'),
    domain LowCardinality(String),
    path String,
    visitor_id String,
    session_uuid String,
    link String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (domain, timestamp)
SETTINGS index_granularity = 8192
"#;

pub const CREATE_FILE_DOWNLOADS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS file_downloads (
    timestamp DateTime64(3, 'UTC'),
    domain LowCardinality(String),
    path String,
    visitor_id String,
    session_uuid String,
    url String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(timestamp)
ORDER BY (domain, timestamp)
SETTINGS index_granularity = 8192
"#;

/// All DDL statements, in creation order.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_SESSIONS_TABLE,
        CREATE_PAGEVIEWS_VIEW,
        CREATE_EVENTS_CUSTOM_TABLE,
        CREATE_OUTBOUND_LINK_CLICKS_TABLE,
        CREATE_FILE_DOWNLOADS_TABLE,
    ]
}
