//! Event ingestion endpoints.
//!
//! Every endpoint answers `200` with an empty body once the event is
//! queued for storage. Storage itself happens asynchronously in batches.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use ingest_core::{Error, PageUri};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::extractors::{ClientInfo, PageReferrer, PageviewHeaders};
use crate::pipeline::{self, EventRequest};
use crate::response::ApiError;
use crate::state::AppState;

/// POST /api/v1/events/pageviews
pub async fn pageview_handler(
    State(state): State<AppState>,
    client: ClientInfo,
    PageReferrer(page): PageReferrer,
    headers: PageviewHeaders,
) -> Result<StatusCode, ApiError> {
    let request = EventRequest::new(&state, client, page);
    let outcome = pipeline::pageview(
        &state,
        &request,
        headers.document_referrer,
        headers.status,
        headers.visitor_id,
    )
    .await?;

    debug!(path = request.page.path(), outcome = ?outcome, "Processed pageview");
    Ok(StatusCode::OK)
}

/// POST /api/v1/events/custom/:name
///
/// The optional body is a JSON object of event properties.
pub async fn custom_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    client: ClientInfo,
    PageReferrer(page): PageReferrer,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let properties = parse_properties(&body)?;
    let request = EventRequest::new(&state, client, page);
    pipeline::custom_event(&state, &request, &name, &properties).await?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/events/outbound-links
///
/// The body is the URL of the clicked link.
pub async fn outbound_link_handler(
    State(state): State<AppState>,
    client: ClientInfo,
    PageReferrer(page): PageReferrer,
    body: String,
) -> Result<StatusCode, ApiError> {
    let link = parse_body_uri(&body, "invalid outbound link")?;
    let request = EventRequest::new(&state, client, page);
    pipeline::outbound_link_click(&state, &request, link).await?;
    Ok(StatusCode::OK)
}

/// POST /api/v1/events/file-downloads
///
/// The body is the URL of the downloaded file.
pub async fn file_download_handler(
    State(state): State<AppState>,
    client: ClientInfo,
    PageReferrer(page): PageReferrer,
    body: String,
) -> Result<StatusCode, ApiError> {
    let file_url = parse_body_uri(&body, "invalid file url")?;
    let request = EventRequest::new(&state, client, page);
    pipeline::file_download(&state, &request, file_url).await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentifyRequest {
    visitor_id: Option<String>,
}

/// POST /api/v1/events/identify
pub async fn identify_handler(
    State(state): State<AppState>,
    client: ClientInfo,
    PageReferrer(page): PageReferrer,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let identify: IdentifyRequest = if body.iter().all(u8::is_ascii_whitespace) {
        IdentifyRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };
    let visitor_id = identify.visitor_id.filter(|id| !id.is_empty());

    let request = EventRequest::new(&state, client, page);
    let session = pipeline::identify(&state, &request, visitor_id).await?;

    debug!(session_uuid = %session.session_uuid, "Identified session");
    Ok(StatusCode::OK)
}

fn parse_properties(body: &[u8]) -> Result<Map<String, Value>, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(properties)) => Ok(properties),
        Ok(_) => Err(Error::invalid_format("event properties must be a JSON object").into()),
        Err(e) => Err(ApiError::bad_request(e.to_string())),
    }
}

fn parse_body_uri(body: &str, context: &str) -> Result<PageUri, ApiError> {
    PageUri::parse(body.trim()).map_err(|e| {
        ApiError::from(Error::invalid_uri(format!("{}: {}", context, e)))
    })
}
