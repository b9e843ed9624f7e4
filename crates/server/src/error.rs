//! Errors surfaced by the HTTP proxy.
//!
//! MCP tools use `shellcache_core::Error` directly, which already converts to
//! a JSON-RPC error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shellcache_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The incoming request could not be mapped onto the app origin.
    #[error("BAD_REQUEST: {0}")]
    BadRequest(String),

    /// Upstream failed for a request the worker did not intercept.
    #[error("{0}")]
    Upstream(#[from] Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(Error::FetchTimeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Upstream(Error::InvalidInput(_) | Error::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(e) if e.is_network() => StatusCode::BAD_GATEWAY,
            ProxyError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::warn!(status = status.as_u16(), error = %self, "proxy error");
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ProxyError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (Error::FetchTimeout("slow".into()).into(), StatusCode::GATEWAY_TIMEOUT),
            (Error::Network("down".into()).into(), StatusCode::BAD_GATEWAY),
            (Error::FetchTooLarge("big".into()).into(), StatusCode::BAD_GATEWAY),
            (Error::MigrationFailed("x".into()).into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
