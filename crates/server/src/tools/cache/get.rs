//! cache_get tool implementation.
//!
//! Looks up the stored response for a request without touching the network.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Error, cache::hash::compute_request_key};

use crate::state::AppState;
use crate::tools::{json_result, target_url};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path on the app origin.
    pub url: String,

    /// HTTP method the entry was stored under (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Only look in this bucket. Defaults to every bucket, oldest first.
    #[serde(default)]
    pub bucket: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub bucket: String,
    pub key: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    pub kind: String,
    pub headers: Vec<(String, String)>,
    /// Body as lossy UTF-8.
    pub body: String,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(state: &AppState, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = target_url(&state.origin, &params.url)?;
    let key = compute_request_key(&params.method, url.as_str());

    let buckets = match params.bucket {
        Some(bucket) => vec![bucket],
        None => state.db.bucket_names().await?,
    };
    let entry = state
        .db
        .match_entry(&buckets, &key)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} {}", params.method.to_ascii_uppercase(), url)))?;
    let response = entry.to_response()?;

    let output = CacheGetOutput {
        bucket: entry.bucket,
        key: entry.key_hash,
        method: entry.method,
        url: entry.url,
        status: entry.status,
        kind: entry.kind,
        headers: response.headers,
        body: String::from_utf8_lossy(&response.body).into_owned(),
        stored_at: entry.stored_at,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::{active_state, text};

    fn params(url: &str, bucket: Option<&str>) -> CacheGetParams {
        CacheGetParams { url: url.into(), method: default_method(), bucket: bucket.map(String::from) }
    }

    #[tokio::test]
    async fn test_get_impl_missing() {
        let (state, _) = active_state().await;
        let result = get_impl(&state, params("/never-fetched", None)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_get_impl_found_in_precache() {
        let (state, _) = active_state().await;
        let result = get_impl(&state, params("/offline", None)).await.unwrap();
        let output: CacheGetOutput = serde_json::from_str(&text(&result)).unwrap();
        assert_eq!(output.bucket, "app-static-v1");
        assert_eq!(output.body, "<html>offline</html>");
        assert_eq!(output.status, 200);
    }

    #[tokio::test]
    async fn test_get_impl_respects_bucket() {
        let (state, _) = active_state().await;
        assert!(get_impl(&state, params("/offline", Some("app-api-v1"))).await.is_err());
        assert!(get_impl(&state, params("/offline", Some("app-static-v1"))).await.is_ok());
    }
}
