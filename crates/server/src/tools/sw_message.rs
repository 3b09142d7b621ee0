//! sw_message tool implementation.
//!
//! Posts a control-channel message to the worker. Skip-wait goes through the
//! registration so a waiting version takes control.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_client::{ControlMessage, Registration, WorkerEvent, WorkerReply, WorkerState};
use stash_core::Error;

use super::json_result;

/// Input parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// "SKIP_WAITING" (or "skip-wait") or "CLEAR_CACHE" (or "clear-all-caches").
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwMessageOutput {
    pub message: ControlMessage,
    /// Worker state after a skip-wait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WorkerState>,
    /// Partitions deleted by a clear.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleared: Option<u64>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(registration: &Registration, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let message: ControlMessage = params.message.parse()?;

    let output = match message {
        ControlMessage::SkipWait => {
            let state = registration.skip_waiting().await?;
            SwMessageOutput { message, state: Some(state), cleared: None }
        }
        ControlMessage::ClearAllCaches => {
            let controller = registration.require_controller().await?;
            match controller.handle(WorkerEvent::Message(message)).await? {
                WorkerReply::Cleared(count) => SwMessageOutput { message, state: None, cleared: Some(count) },
                other => return Err(Error::InvalidInput(format!("unexpected worker reply: {other:?}")).into()),
            }
        }
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result_json;
    use crate::updates::LogPage;
    use stash_client::{FetchClient, UpdateNotifier};
    use stash_core::{AppConfig, CacheDb};
    use std::sync::Arc;

    async fn registration(version: &str) -> (AppConfig, CacheDb, Registration) {
        let config = AppConfig { cache_version: version.into(), static_manifest: vec![], ..Default::default() };
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(FetchClient::new((&config).into()).unwrap());
        let notifier = UpdateNotifier::from_config(Arc::new(LogPage), &config);
        (config, db.clone(), Registration::new(db, network, notifier))
    }

    #[tokio::test]
    async fn test_message_unknown_rejected() {
        let (_, _, registration) = registration("v1").await;
        let result = message_impl(&registration, SwMessageParams { message: "RELOAD".into() }).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_message_skip_wait_promotes_waiting_version() {
        let (config, _, registration) = registration("v1").await;
        registration.register(&config).await.unwrap();
        registration
            .register(&AppConfig { cache_version: "v2".into(), ..config })
            .await
            .unwrap();

        let result = message_impl(&registration, SwMessageParams { message: "SKIP_WAITING".into() })
            .await
            .unwrap();
        let output = result_json(&result);
        assert_eq!(output["state"], "activated");
        assert!(output.get("cleared").is_none());
        assert_eq!(registration.controller().await.unwrap().version(), "v2");
        assert!(registration.waiting().await.is_none());
    }

    #[tokio::test]
    async fn test_message_clear_all_caches() {
        let (config, db, registration) = registration("v1").await;
        registration.register(&config).await.unwrap();
        db.open_partition("stash-static-v1").await.unwrap();
        db.open_partition("stash-api-v0").await.unwrap();

        let result = message_impl(&registration, SwMessageParams { message: "clear-all-caches".into() })
            .await
            .unwrap();
        assert_eq!(result_json(&result)["cleared"], 2);
        assert!(db.list_partitions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_message_before_registration() {
        let (_, _, registration) = registration("v1").await;
        let result = message_impl(&registration, SwMessageParams { message: "CLEAR_CACHE".into() }).await;
        assert!(result.is_err());
    }
}
