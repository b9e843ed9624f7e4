//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::state::AppState;
use crate::tools::{
    CacheBucketsParams, CacheGetParams, CachePurgeParams, NotificationClickParams, WorkerFetchParams,
    WorkerMessageParams, WorkerPushParams, WorkerSyncParams, WorkerUpdateParams, cache, fetch, lifecycle, push,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for shellcache.
#[derive(Clone)]
pub struct ShellcacheServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl ShellcacheServer {
    /// Create a new server handler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Issue a request as a page controlled by the worker would. Reports status, body, and the route (class, strategy, bucket) that answered it."
    )]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch::fetch_impl(&self.state, params.0).await
    }

    #[tool(description = "Show the active and waiting workers and every cache bucket.")]
    async fn worker_status(&self) -> Result<CallToolResult, McpError> {
        lifecycle::status_impl(&self.state).await
    }

    #[tool(
        description = "Install a new worker version (optionally with a new version tag or precache list). Activates immediately when nothing is active or skip_waiting is set."
    )]
    async fn worker_update(&self, params: Parameters<WorkerUpdateParams>) -> Result<CallToolResult, McpError> {
        lifecycle::update_impl(&self.state, params.0).await
    }

    #[tool(description = "Post a client message to the worker, e.g. {\"type\": \"SKIP_WAITING\"}.")]
    async fn worker_message(&self, params: Parameters<WorkerMessageParams>) -> Result<CallToolResult, McpError> {
        lifecycle::message_impl(&self.state, params.0).await
    }

    #[tool(description = "Deliver a background or periodic sync event. Nothing is queued for replay.")]
    async fn worker_sync(&self, params: Parameters<WorkerSyncParams>) -> Result<CallToolResult, McpError> {
        lifecycle::sync_impl(&self.state, params.0).await
    }

    #[tool(description = "Deliver a push message and return the notification that was shown.")]
    async fn worker_push(&self, params: Parameters<WorkerPushParams>) -> Result<CallToolResult, McpError> {
        push::push_impl(&self.state, params.0).await
    }

    #[tool(description = "Click a notification (or one of its actions) and report which window was focused or opened.")]
    async fn notification_click(&self, params: Parameters<NotificationClickParams>) -> Result<CallToolResult, McpError> {
        push::click_impl(&self.state, params.0).await
    }

    #[tool(description = "Look up the cached response for a URL without touching the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        cache::get_impl(&self.state, params.0).await
    }

    #[tool(description = "List cache buckets with entry counts, marking the active worker's buckets.")]
    async fn cache_buckets(&self, params: Parameters<CacheBucketsParams>) -> Result<CallToolResult, McpError> {
        cache::buckets_impl(&self.state, params.0).await
    }

    #[tool(description = "Delete a cache entry, a bucket, or every bucket the active worker does not own.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.state, params.0).await
    }
}

impl ServerHandler for ShellcacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "shellcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
