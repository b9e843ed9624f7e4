//! Upstream HTTP fetching.
//!
//! ### Network seam
//! Strategies only see the [`Network`] trait, so tests can script an
//! offline or flaky upstream without a socket.
//!
//! ### FetchClient
//! - Forwards method, URL and end-to-end headers
//! - Follows up to 5 redirects
//! - Max body bytes: 5MB (configurable)
//! - Non-2xx statuses are responses, not errors; only transport failures err
//! - Cross-origin `no-cors` responses come back opaque so they are never cached

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, resolve};

use shellcache_core::{Error, Request, RequestMode, Response, ResponseKind};

/// Request headers that describe the hop rather than the resource.
const HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "content-length",
    "accept-encoding",
];

/// Something that can perform a request against the real network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request.
    ///
    /// Any HTTP status is a successful fetch; errors mean the request never
    /// produced a response.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// App origin; responses from elsewhere are CORS or opaque.
    pub origin: Option<reqwest::Url>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "shellcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            origin: None,
        }
    }
}

impl FetchConfig {
    /// Fetch settings from the loaded application configuration.
    pub fn from_app(config: &shellcache_core::AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            origin: config.origin_url().ok(),
            ..Default::default()
        }
    }
}

/// HTTP client for upstream requests.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn response_kind(&self, request: &Request) -> ResponseKind {
        let same_origin = self
            .config
            .origin
            .as_ref()
            .is_none_or(|origin| origin.origin() == request.url.origin());
        match (same_origin, request.mode) {
            (true, _) => ResponseKind::Basic,
            (false, RequestMode::NoCors) => ResponseKind::Opaque,
            (false, _) => ResponseKind::Cors,
        }
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("bad method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            if HOP_HEADERS.iter().any(|hop| name.eq_ignore_ascii_case(hop)) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", request.url, e))
            } else {
                Error::Network(format!("{}: {}", request.url, e))
            }
        })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let headers = collect_headers(response.headers());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            url = %request.url,
            status = status.as_u16(),
            bytes = bytes.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched from network"
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
            kind: self.response_kind(request),
        })
    }
}

fn collect_headers(map: &header::HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter(|(name, _)| {
            // body is already decoded and re-framed
            *name != header::CONTENT_ENCODING && *name != header::CONTENT_LENGTH && *name != header::TRANSFER_ENCODING
        })
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect()
}
