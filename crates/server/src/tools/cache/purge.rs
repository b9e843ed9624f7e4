//! cache_purge tool implementation.
//!
//! Purges a single entry, a whole bucket, or every bucket that does not
//! belong to the active worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::{Error, cache::hash::compute_request_key};

use crate::state::AppState;
use crate::tools::{json_result, target_url};

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Bucket to purge. Combined with `url`, only that entry is removed.
    pub bucket: Option<String>,

    /// Remove the GET entry for this URL or path (from every bucket unless
    /// `bucket` is set).
    pub url: Option<String>,

    /// Delete every bucket the active worker does not own.
    #[serde(default)]
    pub stale: bool,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Buckets deleted whole.
    pub deleted_buckets: Vec<String>,
    /// Entries removed individually.
    pub deleted_entries: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(state: &AppState, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.bucket.is_none() && params.url.is_none() && !params.stale {
        return Err(Error::InvalidInput("At least one of bucket, url, or stale must be specified".to_string()).into());
    }

    let mut output = CachePurgeOutput { deleted_buckets: Vec::new(), deleted_entries: 0 };

    if params.stale {
        let worker = state.registration.active().await.ok_or(Error::NoActiveWorker)?;
        output.deleted_buckets.extend(worker.caches().reap_stale().await?);
    }

    match (params.bucket, params.url) {
        (Some(bucket), Some(url)) => {
            let key = compute_request_key("GET", target_url(&state.origin, &url)?.as_str());
            if state.db.delete_entry(&bucket, &key).await? {
                output.deleted_entries += 1;
            }
        }
        (None, Some(url)) => {
            let key = compute_request_key("GET", target_url(&state.origin, &url)?.as_str());
            for bucket in state.db.bucket_names().await? {
                if state.db.delete_entry(&bucket, &key).await? {
                    output.deleted_entries += 1;
                }
            }
        }
        (Some(bucket), None) => {
            if state.db.delete_bucket(&bucket).await? {
                tracing::info!(bucket = %bucket, "bucket purged");
                output.deleted_buckets.push(bucket);
            }
        }
        (None, None) => {}
    }

    json_result(&output)
}
