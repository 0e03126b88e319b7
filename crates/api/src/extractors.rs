//! Request extractors.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use ingest_core::{PageUri, ReferrerUri, UNKNOWN_COUNTRY};
use std::net::SocketAddr;

use crate::response::ApiError;

/// Page the event happened on. Preferred over `Referer`, which browsers
/// may truncate to the origin.
pub const REFERRER_HEADER: &str = "X-Analytics-Referrer";
/// `document.referrer` of the viewed page.
pub const DOCUMENT_REFERRER_HEADER: &str = "X-Analytics-Document-Referrer";
/// HTTP status of the viewed page.
pub const STATUS_HEADER: &str = "X-Analytics-Status";
/// Visitor id chosen by the site.
pub const VISITOR_ID_HEADER: &str = "X-Analytics-Visitor-Id";
/// Country of the client, set by the edge proxy.
pub const COUNTRY_HEADER: &str = "CF-IPCountry";

/// Client IP address.
#[derive(Debug, Clone)]
pub struct ClientIp(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Try X-Forwarded-For first (for proxied requests)
        if let Some(xff) = parts.headers.get("X-Forwarded-For") {
            if let Ok(xff_str) = xff.to_str() {
                // Take the first IP in the chain
                if let Some(ip) = xff_str.split(',').next().map(str::trim) {
                    if !ip.is_empty() {
                        return Ok(ClientIp(Some(ip.to_string())));
                    }
                }
            }
        }

        if let Some(real_ip) = parts.headers.get("X-Real-IP") {
            if let Ok(ip) = real_ip.to_str() {
                return Ok(ClientIp(Some(ip.trim().to_string())));
            }
        }

        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIp(peer))
    }
}

/// Client fingerprint inputs and edge-provided attributes.
#[derive(Debug, Clone)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
    pub country_code: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ClientIp(ip) = ClientIp::from_request_parts(parts, state).await?;

        Ok(ClientInfo {
            ip: ip.unwrap_or_default(),
            user_agent: header_str(&parts.headers, header::USER_AGENT.as_str())
                .unwrap_or_default()
                .to_string(),
            country_code: header_str(&parts.headers, COUNTRY_HEADER)
                .filter(|code| code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
                .map(str::to_ascii_uppercase)
                .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string()),
        })
    }
}

/// The page an event was sent from.
#[derive(Debug, Clone)]
pub struct PageReferrer(pub PageUri);

#[async_trait]
impl<S> FromRequestParts<S> for PageReferrer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = header_str(&parts.headers, REFERRER_HEADER)
            .filter(|value| !value.is_empty())
            .or_else(|| header_str(&parts.headers, header::REFERER.as_str()))
            .unwrap_or_default();

        let page = PageUri::parse(raw).map_err(|e| {
            ApiError::from(ingest_core::Error::invalid_uri(format!(
                "invalid Referer or {}: {}",
                REFERRER_HEADER,
                message_of(&e)
            )))
        })?;

        Ok(PageReferrer(page))
    }
}

/// Attributes of a pageview request.
#[derive(Debug, Clone)]
pub struct PageviewHeaders {
    pub document_referrer: ReferrerUri,
    pub status: u16,
    pub visitor_id: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for PageviewHeaders
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;

        let document_referrer =
            ReferrerUri::parse(header_str(headers, DOCUMENT_REFERRER_HEADER).unwrap_or_default())
                .map_err(|_| {
                    ApiError::from(ingest_core::Error::invalid_uri("invalid document referrer"))
                })?;

        let status = match header_str(headers, STATUS_HEADER).filter(|s| !s.is_empty()) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ApiError::bad_request("invalid pageview status"))?,
            None => 200,
        };

        let visitor_id = header_str(headers, VISITOR_ID_HEADER)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        Ok(PageviewHeaders {
            document_referrer,
            status,
            visitor_id,
        })
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn message_of(err: &ingest_core::Error) -> String {
    match err {
        ingest_core::Error::Validation { message, .. } => message.clone(),
        other => other.to_string(),
    }
}
