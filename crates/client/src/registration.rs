//! Worker registration across versions.
//!
//! Holds the controlling worker and at most one waiting successor. The first
//! version activates immediately; later versions install, wait, and are
//! announced through the [`UpdateNotifier`] until the page applies them.

use std::sync::Arc;

use serde::Serialize;
use stash_core::{AppConfig, CacheDb, Error};
use tokio::sync::{Mutex, RwLock};

use crate::fetch::Network;
use crate::update::{UpdateNotifier, UpdatePhase};
use crate::worker::{ControlMessage, Worker, WorkerEvent, WorkerReply, WorkerState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RegisterOutcome {
    /// No controller yet; installed and activated at once.
    Activated { version: String },
    /// Installed behind the current controller.
    Waiting { version: String },
    /// Already active or waiting.
    Unchanged { version: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub phase: UpdatePhase,
    /// Version the update prompt is tracking.
    pub pending: Option<String>,
}

pub struct Registration {
    db: CacheDb,
    network: Arc<dyn Network>,
    active: RwLock<Option<Arc<Worker>>>,
    waiting: RwLock<Option<Arc<Worker>>>,
    notifier: UpdateNotifier,
    registering: Mutex<()>,
}

impl Registration {
    pub fn new(db: CacheDb, network: Arc<dyn Network>, notifier: UpdateNotifier) -> Self {
        Self {
            db,
            network,
            active: RwLock::new(None),
            waiting: RwLock::new(None),
            notifier,
            registering: Mutex::new(()),
        }
    }

    pub fn notifier(&self) -> &UpdateNotifier {
        &self.notifier
    }

    pub async fn controller(&self) -> Option<Arc<Worker>> {
        self.active.read().await.clone()
    }

    /// The controlling worker, or an error before the first registration.
    pub async fn require_controller(&self) -> Result<Arc<Worker>, Error> {
        self.controller()
            .await
            .ok_or_else(|| Error::InvalidInput("no worker is active".into()))
    }

    pub async fn waiting(&self) -> Option<Arc<Worker>> {
        self.waiting.read().await.clone()
    }

    pub async fn status(&self) -> RegistrationStatus {
        RegistrationStatus {
            active: self.controller().await.map(|w| w.version().to_string()),
            waiting: self.waiting().await.map(|w| w.version().to_string()),
            phase: self.notifier.phase(),
            pending: self.notifier.pending_version(),
        }
    }

    /// Register the version described by `config`.
    pub async fn register(&self, config: &AppConfig) -> Result<RegisterOutcome, Error> {
        let _guard = self.registering.lock().await;
        let version = config.cache_version.clone();

        let controller = self.controller().await;
        let waiting = self.waiting().await;
        let known = controller.iter().chain(waiting.iter()).any(|w| w.version() == version);
        if known {
            return Ok(RegisterOutcome::Unchanged { version });
        }

        let worker = Worker::new(config, self.db.clone(), self.network.clone())?;
        let has_controller = controller.as_ref().is_some_and(|w| w.controls_clients());

        if !has_controller {
            if let WorkerReply::Installed { activate: None, .. } = worker.handle(WorkerEvent::Install).await? {
                worker.handle(WorkerEvent::Activate).await?;
            }
            *self.active.write().await = Some(Arc::new(worker));
            tracing::info!(version = %version, "worker registered and activated");
            return Ok(RegisterOutcome::Activated { version });
        }

        let worker = Arc::new(worker.with_lifecycle(|lc| lc.with_skip_waiting(false)));
        worker.install().await?;
        if let Some(superseded) = self.waiting.write().await.replace(worker) {
            superseded.retire().await;
        }

        if self.notifier.on_installed(&version, true) {
            self.notifier.notify();
        }
        Ok(RegisterOutcome::Waiting { version })
    }

    /// The user accepted the update prompt.
    ///
    /// Returns false when no prompt is showing for a waiting worker.
    pub async fn apply_update(&self) -> Result<bool, Error> {
        let Some(waiting) = self.waiting().await else {
            return Ok(false);
        };
        if !self.notifier.apply(waiting.as_ref()).await? {
            return Ok(false);
        }
        self.promote().await;
        Ok(true)
    }

    /// Skip-wait control message: activate the waiting worker if there is
    /// one, otherwise forward to the controller. Returns the controller state.
    pub async fn skip_waiting(&self) -> Result<WorkerState, Error> {
        if let Some(waiting) = self.waiting().await {
            waiting.handle(WorkerEvent::Message(ControlMessage::SkipWait)).await?;
            self.promote().await;
        }
        let controller = self.require_controller().await?;
        controller.skip_waiting().await
    }

    /// Make the activated waiting worker the controller.
    async fn promote(&self) {
        let Some(next) = self.waiting.write().await.take() else {
            return;
        };
        let version = next.version().to_string();
        if let Some(previous) = self.active.write().await.replace(next) {
            previous.retire().await;
        }
        tracing::info!(version = %version, "controller changed");
        self.notifier.on_controller_change();
    }
}
