//! MCP server handler implementation.
//!
//! This module defines the main server handler that routes tool calls to
//! the controlling worker, the registration, and the partition store.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, get_impl, list_impl};
use crate::tools::{SwFetchParams, SwMessageParams, SwUpdateParams, fetch_impl, message_impl, update_impl};

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
use stash_client::Registration;
use stash_core::CacheDb;
use url::Url;

/// The main MCP server handler for the stash worker.
#[derive(Clone)]
pub struct StashServer {
    tool_router: ToolRouter<Self>,
    registration: Arc<Registration>,
    cache: CacheDb,
    origin: Url,
}

#[tool_router]
impl StashServer {
    /// Create a new server handler around a registration.
    pub fn new(registration: Arc<Registration>, cache: CacheDb, origin: Url) -> Self {
        Self { tool_router: Self::tool_router(), registration, cache, origin }
    }

    /// Route a request through the worker.
    ///
    /// API traffic is network-first, static assets cache-first, navigations
    /// network-first with offline fallbacks.
    #[tool(
        description = "Fetch a URL through the offline cache worker. Returns the traffic class, where the response came from (network, cache, fallback, passthrough), status and body."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        let worker = self.registration.require_controller().await?;
        fetch_impl(&worker, &self.origin, params.0).await
    }

    #[tool(description = "Post a control message to the worker: SKIP_WAITING or CLEAR_CACHE.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.registration, params.0).await
    }

    #[tool(
        description = "Inspect worker versions and the update prompt, or answer it. action: status (default), apply, dismiss."
    )]
    async fn sw_update(&self, params: Parameters<SwUpdateParams>) -> Result<CallToolResult, McpError> {
        update_impl(&self.registration, params.0).await
    }

    #[tool(description = "List cache partitions with entry counts and whether they belong to the running version.")]
    async fn cache_list(&self) -> Result<CallToolResult, McpError> {
        let worker = self.registration.require_controller().await?;
        list_impl(&self.cache, worker.names()).await
    }

    #[tool(description = "Get one stored response from a cache partition by URL and method.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.cache, &self.origin, params.0).await
    }
}

impl ServerHandler for StashServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "stash-worker".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::updates::LogPage;
    use stash_client::{FetchClient, UpdateNotifier};
    use stash_core::AppConfig;

    #[tokio::test]
    async fn test_all_tools_registered() {
        let config = AppConfig::default();
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FetchClient::new((&config).into()).unwrap());
        let notifier = UpdateNotifier::from_config(Arc::new(LogPage), &config);
        let registration = Arc::new(Registration::new(db.clone(), network, notifier));
        let server = StashServer::new(registration, db, config.origin_url().unwrap());

        let mut names: Vec<String> = server
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["cache_get", "cache_list", "sw_fetch", "sw_message", "sw_update"]);
    }
}
