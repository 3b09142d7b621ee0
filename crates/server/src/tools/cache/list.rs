//! cache_list tool implementation.
//!
//! Lists every partition with its entry count.

use rmcp::ErrorData as McpError;
use rmcp::model::CallToolResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use stash_core::{CacheDb, PartitionNames};

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PartitionEntry {
    pub name: String,
    pub entries: u64,
    pub created_at: String,
    /// Whether the partition belongs to the running worker version.
    pub current: bool,
}

/// Output from the cache_list tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheListOutput {
    pub partitions: Vec<PartitionEntry>,
}

/// Implementation of the cache_list tool.
pub async fn list_impl(cache: &CacheDb, names: &PartitionNames) -> Result<CallToolResult, McpError> {
    let partitions = cache
        .partition_summaries()
        .await?
        .into_iter()
        .map(|info| PartitionEntry {
            current: names.is_current(&info.name),
            name: info.name,
            entries: info.entries,
            created_at: info.created_at,
        })
        .collect();

    json_result(&CacheListOutput { partitions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::result_json;

    #[tokio::test]
    async fn test_list_impl_empty() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let result = list_impl(&cache, &PartitionNames::new("stash", "v1")).await.unwrap();
        assert_eq!(result_json(&result)["partitions"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_list_impl_marks_current() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        cache.open_partition("stash-static-v1").await.unwrap();
        cache.open_partition("stash-static-v0").await.unwrap();

        let result = list_impl(&cache, &PartitionNames::new("stash", "v1")).await.unwrap();
        let output: CacheListOutput = serde_json::from_value(result_json(&result)).unwrap();

        let current: Vec<_> = output
            .partitions
            .iter()
            .filter(|p| p.current)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(current, vec!["stash-static-v1"]);
        assert_eq!(output.partitions.len(), 2);
    }
}
