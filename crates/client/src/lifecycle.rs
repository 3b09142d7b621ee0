//! Partition lifecycle across worker versions.
//!
//! Install pre-caches the static manifest into this version's static
//! partition. Activate removes every partition this application owns at
//! other versions. Both are best-effort: individual failures are logged and
//! reported, never fatal.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use stash_core::request::resolve_url;
use stash_core::{CacheDb, Error, PartitionNames, RequestInfo};
use url::Url;

use crate::fetch::Network;

/// Outcome of an install pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Manifest paths stored into the static partition.
    pub cached: Vec<String>,
    /// Manifest paths that could not be fetched or stored.
    pub failed: Vec<String>,
    /// Whether the new version asked to activate without waiting for old clients.
    pub skip_waiting: bool,
}

/// Outcome of an activation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
    /// Stale partitions whose deletion failed; they leak until the next activation.
    pub failed: Vec<String>,
}

/// Owns partition creation and cleanup for one worker version.
#[derive(Clone)]
pub struct CacheLifecycle {
    db: CacheDb,
    network: Arc<dyn Network>,
    names: PartitionNames,
    origin: Url,
    manifest: Vec<String>,
    skip_waiting: bool,
}

impl CacheLifecycle {
    pub fn new(
        db: CacheDb, network: Arc<dyn Network>, names: PartitionNames, origin: Url, manifest: Vec<String>,
    ) -> Self {
        Self { db, network, names, origin, manifest, skip_waiting: true }
    }

    /// Whether install signals immediate activation (default: true).
    pub fn with_skip_waiting(mut self, skip_waiting: bool) -> Self {
        self.skip_waiting = skip_waiting;
        self
    }

    /// Fetch every manifest path and store the successes in the static partition.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let partition = self.names.static_name();
        self.db.open_partition(&partition).await?;

        let results = join_all(self.manifest.iter().map(|path| self.precache(&partition, path))).await;

        let mut report = InstallReport { skip_waiting: self.skip_waiting, ..Default::default() };
        for (path, result) in self.manifest.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(path.clone()),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to pre-cache manifest entry");
                    report.failed.push(path.clone());
                }
            }
        }

        tracing::info!(
            partition = %partition,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "install complete"
        );
        Ok(report)
    }

    async fn precache(&self, partition: &str, path: &str) -> Result<(), Error> {
        let url = resolve_url(&self.origin, path)?;
        let response = self.network.fetch(&RequestInfo::get(url)).await?;
        if !response.is_success() {
            return Err(Error::Network(format!("status {}", response.status)));
        }
        self.db.put_entry(partition, "GET", &response).await
    }

    /// Delete this application's partitions from other versions and make
    /// sure the current ones exist.
    ///
    /// Only fails if the partition list itself cannot be read.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        let existing = self.db.list_partitions().await?;
        let mut report = ActivateReport::default();

        for name in self.names.stale(&existing) {
            match self.db.delete_partition(name).await {
                Ok(_) => {
                    tracing::info!(partition = name, "deleted stale partition");
                    report.deleted.push(name.to_string());
                }
                Err(e) => {
                    tracing::warn!(partition = name, error = %e, "failed to delete stale partition");
                    report.failed.push(name.to_string());
                }
            }
        }

        for name in self.names.current() {
            if let Err(e) = self.db.open_partition(&name).await {
                tracing::warn!(partition = %name, error = %e, "failed to create partition");
            }
        }

        Ok(report)
    }

    /// Delete every partition regardless of name.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        let deleted = self.db.clear_all().await?;
        tracing::info!(deleted, "cleared all partitions");
        Ok(deleted)
    }
}
