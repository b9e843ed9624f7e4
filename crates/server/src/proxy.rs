//! HTTP front for the app origin.
//!
//! Every request hitting the listener is mapped onto the origin and handed to
//! the registration, exactly like a browser tab controlled by the worker.
//! `Sec-Fetch-Mode` and `Sec-Fetch-Dest` are honored when present; without
//! them a `GET` that accepts `text/html` is treated as a navigation.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{Request as HttpRequest, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header},
    response::Response as HttpResponse,
};
use shellcache_client::Served;
use shellcache_client::fetch::resolve;
use shellcache_core::{Destination, Request, RequestMode};
use tokio::net::TcpListener;
use url::Url;

use crate::error::ProxyError;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().fallback(forward).with_state(state)
}

pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    axum::serve(listener, router(state)).await
}

async fn forward(State(state): State<Arc<AppState>>, request: HttpRequest) -> Result<HttpResponse, ProxyError> {
    let request = to_worker_request(&state.origin, state.config.max_bytes, request).await?;
    let described = request.describe();
    let served = state.registration.fetch(request).await?;
    tracing::debug!(
        request = %described,
        status = served.response.status,
        class = served.route.as_ref().map(|r| r.class.as_str()),
        "proxied"
    );
    Ok(to_http_response(served))
}

async fn to_worker_request(origin: &Url, max_bytes: usize, request: HttpRequest) -> Result<Request, ProxyError> {
    let (parts, body) = request.into_parts();
    let path = parts.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let url = resolve(origin, path).map_err(|e| ProxyError::BadRequest(e.to_string()))?;

    let mode = header_str(&parts.headers, "sec-fetch-mode")
        .and_then(RequestMode::from_header)
        .unwrap_or_else(|| infer_mode(&parts.method, &parts.headers));
    let destination = match header_str(&parts.headers, "sec-fetch-dest") {
        Some(dest) => Destination::from_header(dest),
        None if mode == RequestMode::Navigate => Destination::Document,
        None => Destination::Empty,
    };

    let body = to_bytes(body, max_bytes)
        .await
        .map_err(|e| ProxyError::BadRequest(format!("request body: {e}")))?;

    let mut request = Request::new(parts.method.as_str(), url, mode, destination).with_body(body);
    request.headers = parts
        .headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
        .collect();
    Ok(request)
}

fn infer_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    let wants_html = header_str(headers, "accept").is_some_and(|accept| accept.contains("text/html"));
    if method == Method::GET && wants_html { RequestMode::Navigate } else { RequestMode::default() }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Headers that describe the hop and are never copied onto the client response.
fn is_hop_header(name: &HeaderName) -> bool {
    *name == header::CONNECTION || *name == header::TRANSFER_ENCODING || *name == header::CONTENT_LENGTH
}

fn to_http_response(served: Served) -> HttpResponse {
    let Served { response, route, version } = served;
    let mut out = HttpResponse::new(Body::from(response.body));
    *out.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let headers = out.headers_mut();
    for (name, value) in &response.headers {
        let (Ok(name), Ok(value)) = (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) else {
            continue;
        };
        if is_hop_header(&name) {
            continue;
        }
        headers.append(name, value);
    }

    let source = route.as_ref().map(|r| r.class.as_str()).unwrap_or("network");
    headers.insert("x-shellcache-route", HeaderValue::from_static(source));
    if let Some(version) = version.and_then(|v| HeaderValue::from_str(&v).ok()) {
        headers.insert("x-shellcache-version", version);
    }
    out
}
