//! Page and referrer URIs.
//!
//! Paths are normalized once at parse time: an empty path becomes `/` and
//! trailing slashes are stripped, so `/blog/` and `/blog` index the same
//! session.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Absolute URI of a visited page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PageUri {
    url: Url,
    path: String,
}

impl PageUri {
    /// Parses an absolute URI. Relative URIs are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw.trim()).map_err(|e| match e {
            url::ParseError::RelativeUrlWithoutBase => Error::invalid_uri("uri is relative"),
            other => Error::invalid_uri(format!("invalid uri: {}", other)),
        })?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(Error::invalid_uri("uri has no host"));
        }

        let path = normalize_path(url.path());
        Ok(Self { url, path })
    }

    /// Host name without port.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Normalized path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// First value of a query parameter.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// Same origin with path `/` and no query or fragment.
    pub fn root(&self) -> Self {
        let mut url = self.url.clone();
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        Self {
            url,
            path: "/".to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl std::fmt::Display for PageUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl From<PageUri> for String {
    fn from(uri: PageUri) -> Self {
        uri.url.into()
    }
}

impl TryFrom<String> for PageUri {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Referrer of a page; an empty referrer means direct traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ReferrerUri(Option<PageUri>);

impl ReferrerUri {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::direct());
        }
        PageUri::parse(raw).map(|uri| Self(Some(uri)))
    }

    pub fn direct() -> Self {
        Self(None)
    }

    pub fn is_direct(&self) -> bool {
        self.0.is_none()
    }

    pub fn uri(&self) -> Option<&PageUri> {
        self.0.as_ref()
    }

    pub fn host(&self) -> Option<&str> {
        self.0.as_ref().map(PageUri::host)
    }

    pub fn path(&self) -> Option<&str> {
        self.0.as_ref().map(PageUri::path)
    }

    /// Referrer host, or `direct` when there is none.
    pub fn host_or_direct(&self) -> &str {
        self.host().unwrap_or("direct")
    }
}

impl From<PageUri> for ReferrerUri {
    fn from(uri: PageUri) -> Self {
        Self(Some(uri))
    }
}

impl From<ReferrerUri> for String {
    fn from(referrer: ReferrerUri) -> Self {
        referrer.0.map(String::from).unwrap_or_default()
    }
}

impl TryFrom<String> for ReferrerUri {
    type Error = Error;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}
