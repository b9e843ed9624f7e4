//! Request and response model shared by the worker, its strategies and hosts.
//!
//! These mirror the shape of a browser fetch: a request carries its mode and
//! declared destination so the classifier can tell a full-page load from a
//! sub-resource fetch, and a response carries its kind so opaque responses can
//! be kept out of the cache.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Full page load.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl RequestMode {
    /// Parse a `Sec-Fetch-Mode` header value.
    pub fn from_header(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigate" => Some(Self::Navigate),
            "same-origin" => Some(Self::SameOrigin),
            "no-cors" => Some(Self::NoCors),
            "cors" => Some(Self::Cors),
            _ => None,
        }
    }
}

/// What the requested resource will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Destination {
    Document,
    Image,
    Font,
    Script,
    Style,
    Manifest,
    #[default]
    Empty,
    Other,
}

impl Destination {
    /// Parse a `Sec-Fetch-Dest` header value.
    pub fn from_header(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "document" | "iframe" | "frame" => Self::Document,
            "image" => Self::Image,
            "font" => Self::Font,
            "script" | "worker" | "sharedworker" => Self::Script,
            "style" => Self::Style,
            "manifest" => Self::Manifest,
            "empty" | "" => Self::Empty,
            _ => Self::Other,
        }
    }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Uppercase HTTP method.
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Only forwarded for pass-through requests; never part of the cache key.
    #[serde(default, skip_serializing_if = "Bytes::is_empty")]
    pub body: Bytes,
}

impl Request {
    /// Build a request, normalizing the method to uppercase and dropping the fragment.
    pub fn new(method: &str, mut url: Url, mode: RequestMode, destination: Destination) -> Self {
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url, mode, destination, headers: Vec::new(), body: Bytes::new() }
    }

    /// A plain sub-resource `GET`.
    pub fn get(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Cors, Destination::Empty)
    }

    /// A full page load.
    pub fn navigate(url: Url) -> Self {
        Self::new("GET", url, RequestMode::Navigate, Destination::Document)
    }

    /// Parse `input` as an absolute URL and build a `GET` for it.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUrl` if `input` does not parse.
    pub fn parse_get(input: &str) -> Result<Self, Error> {
        let url = Url::parse(input.trim()).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;
        Ok(Self::get(url))
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Lowercased extension of the last path segment, if any.
    pub fn extension(&self) -> Option<String> {
        let segment = self.url.path_segments()?.next_back()?;
        let (stem, ext) = segment.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// `METHOD URL`, used in logs and error messages.
    pub fn describe(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Where a response came from, as far as caching is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseKind {
    /// Same-origin response.
    #[default]
    Basic,
    /// Cross-origin response with readable body.
    Cors,
    /// Cross-origin response whose status and body are hidden.
    Opaque,
    /// Built locally by the worker.
    Synthetic,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Cors => "cors",
            ResponseKind::Opaque => "opaque",
            ResponseKind::Synthetic => "synthetic",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "basic" => Some(ResponseKind::Basic),
            "cors" => Some(ResponseKind::Cors),
            "opaque" => Some(ResponseKind::Opaque),
            "synthetic" => Some(ResponseKind::Synthetic),
            _ => None,
        }
    }
}

/// A response returned to the page, either live, cached or synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    #[serde(default)]
    pub kind: ResponseKind,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            status_text: reason_phrase(status).to_string(),
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Status in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Only ok, non-opaque responses are ever written to a bucket.
    pub fn is_cacheable(&self) -> bool {
        self.is_ok() && self.kind != ResponseKind::Opaque
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Placeholder served when a navigation fails and no offline page is cached.
    pub fn offline_placeholder() -> Self {
        Self::new(
            200,
            "<!doctype html><html><head><title>Offline</title></head>\
             <body><h1>Offline</h1><p>You appear to be offline. Reconnect and try again.</p></body></html>",
        )
        .with_header("content-type", "text/html; charset=utf-8")
        .with_kind(ResponseKind::Synthetic)
    }

    /// Returned for sub-resource requests that could not be served at all.
    pub fn service_unavailable() -> Self {
        Self::new(503, "Service Unavailable")
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_kind(ResponseKind::Synthetic)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "",
    }
}
