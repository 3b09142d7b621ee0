//! Update plumbing for the stdio host.
//!
//! There is no page to draw on, so prompts and reloads are logged. New
//! versions are discovered by reloading configuration and registering
//! whatever `cache_version` it now names.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use stash_client::{Page, RegisterOutcome, Registration, UpdateCheck};
use stash_core::{AppConfig, ConfigError, Error};

/// `Page` that reports through tracing.
pub struct LogPage;

impl Page for LogPage {
    fn show_update_prompt(&self, version: &str) {
        tracing::info!(version, "update available; call sw_update with action \"apply\" to activate");
    }

    fn hide_update_prompt(&self) {
        tracing::debug!("update prompt hidden");
    }

    fn reload(&self) {
        tracing::info!("controller changed; clients should reload");
    }
}

type Loader = Box<dyn Fn() -> Result<AppConfig, ConfigError> + Send + Sync>;

/// Reloads configuration and registers a changed `cache_version`.
pub struct ConfigVersionCheck {
    registration: Weak<Registration>,
    load: Loader,
}

impl ConfigVersionCheck {
    pub fn new(registration: &Arc<Registration>) -> Self {
        Self::with_loader(registration, Box::new(AppConfig::load))
    }

    pub fn with_loader(registration: &Arc<Registration>, load: Loader) -> Self {
        Self { registration: Arc::downgrade(registration), load }
    }
}

#[async_trait]
impl UpdateCheck for ConfigVersionCheck {
    async fn check_for_update(&self) -> Result<bool, Error> {
        let Some(registration) = self.registration.upgrade() else {
            return Ok(false);
        };
        let config = (self.load)().map_err(|e| Error::InvalidInput(e.to_string()))?;

        match registration.register(&config).await? {
            RegisterOutcome::Waiting { .. } | RegisterOutcome::Activated { .. } => Ok(true),
            RegisterOutcome::Unchanged { .. } => Ok(false),
        }
    }
}
