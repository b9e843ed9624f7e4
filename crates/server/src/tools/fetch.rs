//! worker_fetch tool implementation.
//!
//! Issues a request as a controlled page would and reports how it was served.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Destination, Error, Request, RequestMode, Route};

use super::{json_result, target_url};
use crate::state::AppState;

/// Input parameters for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Absolute URL, or a path (`/skills`) on the app origin.
    pub url: String,

    /// HTTP method (default: GET). Anything else passes through to the network.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: Option<String>,

    /// Request destination, e.g. "document", "image", "script" (default: empty).
    #[serde(default)]
    pub destination: Option<String>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Truncate the returned body to this many characters (default: 4000).
    #[serde(default = "default_max_body_chars")]
    pub max_body_chars: usize,
}

fn default_method() -> String {
    "GET".into()
}

fn default_max_body_chars() -> usize {
    4000
}

/// Output structure for worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    /// basic, cors, opaque or synthetic.
    pub kind: String,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Body as lossy UTF-8.
    pub body: String,
    pub body_bytes: usize,
    pub truncated: bool,
    /// The route the worker chose; absent when the network answered directly.
    pub route: Option<Route>,
    /// Version of the worker that answered.
    pub version: Option<String>,
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(state: &AppState, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    let url = target_url(&state.origin, &params.url)?;
    let mode = match params.mode.as_deref() {
        Some(mode) => {
            RequestMode::from_header(mode).ok_or_else(|| Error::InvalidInput(format!("unsupported mode: {mode}")))?
        }
        None => RequestMode::default(),
    };
    let destination = match params.destination.as_deref() {
        Some(dest) => Destination::from_header(dest),
        None if mode == RequestMode::Navigate => Destination::Document,
        None => Destination::Empty,
    };

    let mut request = Request::new(&params.method, url, mode, destination);
    for (name, value) in &params.headers {
        request = request.with_header(name, value);
    }

    let served = state.registration.fetch(request).await?;
    let response = served.response;
    let text = String::from_utf8_lossy(&response.body);
    let truncated = text.chars().count() > params.max_body_chars;
    let body = if truncated { text.chars().take(params.max_body_chars).collect() } else { text.into_owned() };

    let output = WorkerFetchOutput {
        url: params.url,
        status: response.status,
        status_text: response.status_text.clone(),
        kind: response.kind.as_str().to_string(),
        content_type: response.content_type().map(String::from),
        body,
        body_bytes: response.body.len(),
        truncated,
        headers: response.headers,
        route: served.route,
        version: served.version,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{active_state, text};
    use shellcache_core::{ResourceClass, Response};

    fn params(url: &str) -> WorkerFetchParams {
        WorkerFetchParams {
            url: url.into(),
            method: default_method(),
            mode: None,
            destination: None,
            headers: BTreeMap::new(),
            max_body_chars: default_max_body_chars(),
        }
    }

    async fn fetch(state: &AppState, params: WorkerFetchParams) -> WorkerFetchOutput {
        let result = fetch_impl(state, params).await.unwrap();
        serde_json::from_str(&text(&result)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_api_then_offline() {
        let (state, network) = active_state().await;
        network.serve("/api/skills", Response::new(200, r#"{"skills":[]}"#));

        let online = fetch(&state, params("/api/skills")).await;
        assert_eq!(online.route.unwrap().class, ResourceClass::Api);
        state.registration.settle().await;

        network.set_offline(true);
        let offline = fetch(&state, params("/api/skills")).await;
        assert_eq!(offline.status, 200);
        assert_eq!(offline.body, r#"{"skills":[]}"#);
    }

    #[tokio::test]
    async fn test_fetch_navigation_mode() {
        let (state, network) = active_state().await;
        network.set_offline(true);
        let mut p = params("/profile");
        p.mode = Some("navigate".into());

        let output = fetch(&state, p).await;
        assert_eq!(output.body, "<html>offline</html>");
    }

    #[tokio::test]
    async fn test_fetch_truncates_body() {
        let (state, network) = active_state().await;
        network.serve("/api/big", Response::new(200, "x".repeat(50)));
        let mut p = params("/api/big");
        p.max_body_chars = 10;

        let output = fetch(&state, p).await;
        assert!(output.truncated);
        assert_eq!(output.body.len(), 10);
        assert_eq!(output.body_bytes, 50);
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_input() {
        let (state, _) = active_state().await;
        assert!(fetch_impl(&state, params("")).await.is_err());
        let mut p = params("/skills");
        p.mode = Some("teleport".into());
        assert!(fetch_impl(&state, p).await.is_err());
    }
}
