//! MCP tool implementations.
//!
//! Every tool renders its output as pretty JSON in a single text block.

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod push;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use shellcache_core::Error;
use url::Url;

pub use cache::{CacheBucketsParams, CacheGetParams, CachePurgeParams};
pub use fetch::WorkerFetchParams;
pub use lifecycle::{WorkerMessageParams, WorkerSyncParams, WorkerUpdateParams};
pub use push::{NotificationClickParams, WorkerPushParams};

fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Accept either an absolute URL or a path on the app origin.
fn target_url(origin: &Url, input: &str) -> Result<Url, Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()));
    }
    if input.starts_with('/') {
        return shellcache_client::fetch::resolve(origin, input).map_err(|e| Error::InvalidUrl(e.to_string()));
    }
    shellcache_client::fetch::canonicalize(input).map_err(|e| Error::InvalidUrl(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_url() {
        let origin = Url::parse("https://app.test").unwrap();
        assert_eq!(target_url(&origin, "/skills?page=2").unwrap().as_str(), "https://app.test/skills?page=2");
        assert_eq!(
            target_url(&origin, "https://XYZ.supabase.co/rest/v1/skills").unwrap().as_str(),
            "https://xyz.supabase.co/rest/v1/skills"
        );
        assert!(matches!(target_url(&origin, "  "), Err(Error::InvalidInput(_))));
        assert!(matches!(target_url(&origin, "//evil.test"), Err(Error::InvalidUrl(_))));
    }
}
