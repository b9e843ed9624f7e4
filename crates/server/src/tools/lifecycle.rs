//! Worker lifecycle tools: worker_status, worker_update, worker_message, worker_sync.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::{ActivationReport, ClientMessage, RegistrationStatus};
use shellcache_core::Error;
use shellcache_core::cache::BucketInfo;

use super::json_result;
use crate::state::AppState;

/// Output structure for worker_status tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkerStatusOutput {
    pub registration: RegistrationStatus,
    pub buckets: Vec<BucketInfo>,
    pub checked_at: String,
}

pub async fn status_impl(state: &AppState) -> Result<CallToolResult, McpError> {
    let output = WorkerStatusOutput {
        registration: state.registration.status().await,
        buckets: state.db.bucket_infos().await?,
        checked_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
    };
    json_result(&output)
}

/// Input parameters for worker_update tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerUpdateParams {
    /// Version tag for the new worker (default: the configured tag).
    #[serde(default)]
    pub version_tag: Option<String>,

    /// Paths to precache instead of the configured manifest.
    #[serde(default)]
    pub precache: Option<Vec<String>>,

    /// Activate right after install instead of waiting.
    #[serde(default)]
    pub skip_waiting: bool,
}

/// Install a new worker version. A failed install leaves the active worker in place.
pub async fn update_impl(state: &AppState, params: WorkerUpdateParams) -> Result<CallToolResult, McpError> {
    let settings = state.settings(params.version_tag.as_deref(), params.precache)?;
    let report = state.registration.register(settings, params.skip_waiting).await?;
    json_result(&report)
}

/// Input parameters for worker_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerMessageParams {
    /// Message object as a page would post it, e.g. `{"type": "SKIP_WAITING"}`.
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkerMessageOutput {
    pub delivered: bool,
    /// Present when the message promoted the waiting worker.
    pub activation: Option<ActivationReport>,
}

pub async fn message_impl(state: &AppState, params: WorkerMessageParams) -> Result<CallToolResult, McpError> {
    let message: ClientMessage = serde_json::from_value(params.message)
        .map_err(|e| Error::InvalidPayload(format!("client message: {e}")))?;
    let activation = state.registration.post_message(message).await?;
    json_result(&WorkerMessageOutput { delivered: true, activation })
}

/// Input parameters for worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncParams {
    /// Sync registration tag.
    pub tag: String,

    /// Deliver a periodic sync instead of a one-off sync.
    #[serde(default)]
    pub periodic: bool,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct WorkerSyncOutput {
    pub tag: String,
    /// Always zero: nothing is queued for replay.
    pub replayed: usize,
}

pub async fn sync_impl(state: &AppState, params: WorkerSyncParams) -> Result<CallToolResult, McpError> {
    if params.tag.trim().is_empty() {
        return Err(Error::InvalidInput("tag cannot be empty".into()).into());
    }
    state.registration.sync(&params.tag, params.periodic).await?;
    json_result(&WorkerSyncOutput { tag: params.tag, replayed: 0 })
}
