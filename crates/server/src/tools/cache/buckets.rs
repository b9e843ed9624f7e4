//! cache_buckets tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_core::cache::{BucketInfo, EntrySummary};

use crate::state::AppState;
use crate::tools::json_result;

/// Parameters for the cache_buckets tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheBucketsParams {
    /// Also list every entry in each bucket.
    #[serde(default)]
    pub entries: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BucketListing {
    #[serde(flatten)]
    pub info: BucketInfo,
    /// Whether the bucket belongs to the active worker.
    pub current: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<EntrySummary>>,
}

/// Output from the cache_buckets tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheBucketsOutput {
    pub active_version: Option<String>,
    pub buckets: Vec<BucketListing>,
}

pub async fn buckets_impl(state: &AppState, params: CacheBucketsParams) -> Result<CallToolResult, McpError> {
    let active = state.registration.active().await;
    let mut buckets = Vec::new();
    for info in state.db.bucket_infos().await? {
        let current = active.as_ref().is_some_and(|w| w.settings().names.is_current(&info.name));
        let entries = if params.entries { Some(state.db.bucket_entries(&info.name).await?) } else { None };
        buckets.push(BucketListing { info, current, entries });
    }

    let output = CacheBucketsOutput { active_version: active.map(|w| w.version().to_string()), buckets };
    json_result(&output)
}
