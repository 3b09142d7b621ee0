//! sw_update tool implementation.
//!
//! Reports the registration state and answers the update prompt.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::{Registration, RegistrationStatus};
use stash_core::Error;

use super::json_result;

/// Input parameters for the sw_update tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwUpdateParams {
    /// "status" (default), "apply" or "dismiss".
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwUpdateOutput {
    #[serde(flatten)]
    pub status: RegistrationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismissed: Option<bool>,
}

pub async fn update_impl(registration: &Registration, params: SwUpdateParams) -> Result<CallToolResult, McpError> {
    let (mut applied, mut dismissed) = (None, None);
    match params.action.as_deref().unwrap_or("status") {
        "status" => {}
        "apply" => applied = Some(registration.apply_update().await?),
        "dismiss" => dismissed = Some(registration.notifier().dismiss()),
        other => return Err(Error::InvalidInput(format!("unknown update action: {other}")).into()),
    }

    let status = registration.status().await;
    json_result(&SwUpdateOutput { status, applied, dismissed })
}
