//! worker_push and notification_click tool implementations.

use bytes::Bytes;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shellcache_client::Notification;

use super::json_result;
use crate::state::AppState;

/// Input parameters for worker_push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct WorkerPushParams {
    /// Raw push payload. A JSON object may set title, body, icon, badge,
    /// image, tag, data, actions, requireInteraction and silent; any other
    /// text becomes the notification body.
    #[serde(default)]
    pub payload: Option<String>,
}

pub async fn push_impl(state: &AppState, params: WorkerPushParams) -> Result<CallToolResult, McpError> {
    let payload = params.payload.map(Bytes::from);
    let notification = state.registration.push(payload).await?;
    json_result(&notification)
}

/// Input parameters for notification_click tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {
    /// The notification as returned by worker_push.
    pub notification: Notification,

    /// The action button clicked; omit for a click on the body.
    #[serde(default)]
    pub action: Option<String>,
}

pub async fn click_impl(state: &AppState, params: NotificationClickParams) -> Result<CallToolResult, McpError> {
    let outcome = state.registration.notification_click(params.notification, params.action).await?;
    json_result(&outcome)
}
