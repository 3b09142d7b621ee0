//! Worker event dispatcher.
//!
//! One handler per event kind. Fetches are classified by the pure
//! `stash_core::classify` before any I/O, then handed to the matching strategy.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use stash_core::{AppConfig, CacheDb, Error, PartitionNames, RequestInfo, RouteRules, TrafficClass, classify};
use tokio::sync::RwLock;

use crate::fetch::Network;
use crate::lifecycle::{ActivateReport, CacheLifecycle, InstallReport};
use crate::strategy::{Served, Strategies};

/// Lifecycle state of one worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    /// Created, install not yet finished.
    Installing,
    /// Installed; waiting while an older version still controls clients.
    Installed,
    Activating,
    Activated,
    /// Superseded by a newer version.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(s)
    }
}

/// Control-channel messages from the foreground page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMessage {
    /// Activate a waiting version now.
    SkipWait,
    /// Delete every partition, for manual recovery.
    ClearAllCaches,
}

impl FromStr for ControlMessage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SKIP_WAITING" | "skip-wait" | "skip_wait" => Ok(ControlMessage::SkipWait),
            "CLEAR_CACHE" | "clear-all-caches" | "clear_all_caches" => Ok(ControlMessage::ClearAllCaches),
            other => Err(Error::InvalidInput(format!("unknown control message: {other}"))),
        }
    }
}

/// Events delivered to a worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(RequestInfo),
    Message(ControlMessage),
}

/// Result of a fetch event.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the caller goes to the network itself.
    Passthrough,
    Served { class: TrafficClass, served: Served },
}

/// Reply to a handled event.
#[derive(Debug)]
pub enum WorkerReply {
    Installed { install: InstallReport, activate: Option<ActivateReport> },
    Activated(ActivateReport),
    Fetched(FetchOutcome),
    /// State after a skip-wait message.
    State(WorkerState),
    Cleared(u64),
}

/// One worker version: routing rules, strategies and partition lifecycle.
pub struct Worker {
    rules: RouteRules,
    names: PartitionNames,
    navigation_fallbacks: Vec<String>,
    lifecycle: CacheLifecycle,
    strategies: Strategies,
    state: RwLock<WorkerState>,
    claimed: AtomicBool,
}

impl Worker {
    /// Build a worker for the configured version.
    pub fn new(config: &AppConfig, db: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let names = config.partition_names();
        let lifecycle =
            CacheLifecycle::new(db.clone(), network.clone(), names.clone(), origin, config.static_manifest.clone());

        Ok(Self {
            rules: config.route_rules(),
            names,
            navigation_fallbacks: config.navigation_fallbacks(),
            lifecycle,
            strategies: Strategies::new(network, db),
            state: RwLock::new(WorkerState::Installing),
            claimed: AtomicBool::new(false),
        })
    }

    /// Replace the lifecycle manager, e.g. to disable immediate activation.
    pub fn with_lifecycle(mut self, f: impl FnOnce(CacheLifecycle) -> CacheLifecycle) -> Self {
        self.lifecycle = f(self.lifecycle);
        self
    }

    pub fn version(&self) -> &str {
        self.names.version()
    }

    pub fn names(&self) -> &PartitionNames {
        &self.names
    }

    /// Upstream used for requests the worker does not intercept.
    pub fn network(&self) -> &Arc<dyn Network> {
        self.strategies.network()
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether this version has taken control of open clients.
    pub fn controls_clients(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }

    pub async fn handle(&self, event: WorkerEvent) -> Result<WorkerReply, Error> {
        match event {
            WorkerEvent::Install => {
                let install = self.install().await?;
                let activate = if install.skip_waiting { Some(self.activate().await?) } else { None };
                Ok(WorkerReply::Installed { install, activate })
            }
            WorkerEvent::Activate => Ok(WorkerReply::Activated(self.activate().await?)),
            WorkerEvent::Fetch(request) => Ok(WorkerReply::Fetched(self.fetch(&request).await?)),
            WorkerEvent::Message(ControlMessage::SkipWait) => Ok(WorkerReply::State(self.skip_waiting().await?)),
            WorkerEvent::Message(ControlMessage::ClearAllCaches) => {
                Ok(WorkerReply::Cleared(self.lifecycle.clear_all().await?))
            }
        }
    }

    /// Run the install step. Leaves the worker `Installed` (waiting).
    ///
    /// The state lock is held across the precache so a concurrent install
    /// sees `Installed` and is rejected instead of fetching the manifest again.
    pub async fn install(&self) -> Result<InstallReport, Error> {
        let mut state = self.state.write().await;
        if *state != WorkerState::Installing {
            return Err(Error::InvalidInput(format!("cannot install a worker in state {state}")));
        }

        let report = self.lifecycle.install().await?;
        *state = WorkerState::Installed;
        drop(state);
        tracing::info!(version = self.version(), "worker installed");
        Ok(report)
    }

    /// Activate an installed worker: evict stale partitions and claim clients.
    pub async fn activate(&self) -> Result<ActivateReport, Error> {
        {
            let mut state = self.state.write().await;
            if *state != WorkerState::Installed {
                return Err(Error::InvalidInput(format!("cannot activate a worker in state {state}")));
            }
            *state = WorkerState::Activating;
        }

        let report = self.lifecycle.activate().await;
        // Activation completes even if cleanup could not run.
        let report = report.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "partition cleanup skipped");
            ActivateReport::default()
        });

        *self.state.write().await = WorkerState::Activated;
        self.claimed.store(true, Ordering::SeqCst);
        tracing::info!(version = self.version(), deleted = report.deleted.len(), "worker activated");
        Ok(report)
    }

    /// Skip-wait message: activate if waiting, otherwise report the current state.
    pub async fn skip_waiting(&self) -> Result<WorkerState, Error> {
        if self.state().await == WorkerState::Installed {
            self.activate().await?;
        }
        Ok(self.state().await)
    }

    /// Mark this version superseded.
    pub async fn retire(&self) {
        *self.state.write().await = WorkerState::Redundant;
        self.claimed.store(false, Ordering::SeqCst);
    }

    /// Route one request through its strategy.
    pub async fn fetch(&self, request: &RequestInfo) -> Result<FetchOutcome, Error> {
        let Some(class) = classify(request, &self.rules) else {
            tracing::debug!(url = %request.url, "not intercepted");
            return Ok(FetchOutcome::Passthrough);
        };

        let partition = self.names.name(class.partition());
        tracing::debug!(url = %request.url, %class, partition = %partition, "routing request");

        let served = match class {
            TrafficClass::Api => self.strategies.network_first(&partition, request, &[]).await?,
            // Offline navigations may be answered by the install-time precache.
            TrafficClass::Navigation => {
                self.strategies
                    .network_first_across(&partition, &[self.names.static_name()], request, &self.navigation_fallbacks)
                    .await?
            }
            TrafficClass::StaticAsset => self.strategies.cache_first(&partition, request).await?,
            TrafficClass::Other => self.strategies.network_with_fallback(&partition, request).await?,
        };

        Ok(FetchOutcome::Served { class, served })
    }
}
