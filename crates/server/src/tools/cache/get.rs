//! cache_get tool implementation.
//!
//! Looks up one stored response by partition, method and URL.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_core::request::resolve_url;
use stash_core::{CacheDb, Error};
use url::Url;

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Partition name, e.g. "stash-api-v1".
    pub partition: String,

    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method of the stored request (default: GET).
    #[serde(default)]
    pub method: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub partition: String,
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body_len: usize,
    pub body: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve_url(origin, &params.url)?;
    let method = params.method.as_deref().unwrap_or("GET").to_ascii_uppercase();

    let response = cache
        .match_entry(&params.partition, &method, &url)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{method} {url} in {}", params.partition)))?;

    let output = CacheGetOutput {
        partition: params.partition,
        url: response.url.to_string(),
        status: response.status,
        headers: response.headers.clone(),
        content_type: response.content_type().map(str::to_string),
        body_len: response.body_len(),
        body: response.text(),
    };

    json_result(&output)
}
