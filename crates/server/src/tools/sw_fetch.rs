//! sw_fetch tool implementation.
//!
//! Runs one request through the worker exactly as an intercepted page fetch
//! would: classification, strategy, then the partition store.

use std::collections::BTreeMap;

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::{FetchOutcome, Network, Worker};
use stash_core::request::resolve_url;
use stash_core::{Destination, RequestInfo, RequestMode, Response, TrafficClass};
use url::Url;

use super::json_result;

/// Input parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default)]
    pub method: Option<String>,

    /// Request destination, e.g. "document", "script", "style", "image", "font".
    #[serde(default)]
    pub destination: Option<String>,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: Option<String>,

    /// Request headers forwarded upstream.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body forwarded upstream, e.g. a JSON payload for an API write.
    #[serde(default)]
    pub body: Option<String>,
}

/// Output structure for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    /// Traffic class, absent when the worker did not intercept the request.
    pub class: Option<TrafficClass>,
    /// One of "network", "cache", "fallback" or "passthrough".
    pub source: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl SwFetchOutput {
    fn new(class: Option<TrafficClass>, source: &str, response: Response) -> Self {
        Self {
            url: response.url.to_string(),
            class,
            source: source.to_string(),
            status: response.status,
            content_type: response.content_type().map(str::to_string),
            body: response.text(),
        }
    }
}

fn build_request(origin: &Url, params: &SwFetchParams) -> Result<RequestInfo, McpError> {
    let url = resolve_url(origin, &params.url)?;
    let mut request = RequestInfo::get(url);

    if let Some(method) = params.method.as_deref() {
        request = request.with_method(method);
    }
    if let Some(destination) = params.destination.as_deref() {
        let Ok(destination) = destination.parse::<Destination>();
        request = request.with_destination(destination);
    }
    if let Some(mode) = params.mode.as_deref() {
        let mode: RequestMode = mode.parse()?;
        request = request.with_mode(mode);
    }
    for (name, value) in &params.headers {
        request = request.with_header(name, value);
    }
    if let Some(body) = &params.body {
        request = request.with_body(body.clone());
    }
    Ok(request)
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(worker: &Worker, origin: &Url, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let request = build_request(origin, &params)?;

    let output = match worker.fetch(&request).await? {
        FetchOutcome::Served { class, served } => {
            SwFetchOutput::new(Some(class), &served.source.to_string(), served.response)
        }
        FetchOutcome::Passthrough => {
            let response = worker.network().fetch(&request).await?;
            SwFetchOutput::new(None, "passthrough", response)
        }
    };

    json_result(&output)
}
