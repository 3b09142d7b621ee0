//! Foreground update notification.
//!
//! Tracks a newly installed worker version from "waiting" to either
//! dismissed or applied, shows at most one prompt per version, and reloads the
//! page at most once when control passes to the new version.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use stash_core::{AppConfig, Error};
use tokio::task::JoinHandle;

use crate::worker::{ControlMessage, Worker};

/// The page surface the notifier drives.
pub trait Page: Send + Sync {
    fn show_update_prompt(&self, version: &str);
    fn hide_update_prompt(&self);
    fn reload(&self);
}

/// Control channel to a waiting worker.
#[async_trait]
pub trait WorkerChannel: Send + Sync {
    async fn post(&self, message: ControlMessage) -> Result<(), Error>;
}

/// Periodic "is there a newer worker?" check.
#[async_trait]
pub trait UpdateCheck: Send + Sync {
    /// Returns true when a newer version was found.
    async fn check_for_update(&self) -> Result<bool, Error>;
}

#[async_trait]
impl WorkerChannel for Worker {
    async fn post(&self, message: ControlMessage) -> Result<(), Error> {
        self.handle(crate::worker::WorkerEvent::Message(message)).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePhase {
    Idle,
    WaitingForActivation,
    Notified,
    Dismissed,
    Applied,
}

#[derive(Debug)]
struct Inner {
    phase: UpdatePhase,
    version: Option<String>,
    prompted: HashSet<String>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Moves a notified prompt to dismissed. Returns false if nothing was showing.
fn dismiss_prompt(inner: &Mutex<Inner>, page: &dyn Page) -> bool {
    let mut state = lock(inner);
    if state.phase != UpdatePhase::Notified {
        return false;
    }
    state.phase = UpdatePhase::Dismissed;
    drop(state);
    page.hide_update_prompt();
    true
}

pub struct UpdateNotifier {
    page: Arc<dyn Page>,
    inner: Arc<Mutex<Inner>>,
    dismiss_after: Duration,
    check_interval: Duration,
    reloaded: AtomicBool,
    checks_scheduled: AtomicBool,
    dismiss_task: Mutex<Option<JoinHandle<()>>>,
    check_task: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateNotifier {
    pub fn new(page: Arc<dyn Page>, dismiss_after: Duration, check_interval: Duration) -> Self {
        Self {
            page,
            inner: Arc::new(Mutex::new(Inner { phase: UpdatePhase::Idle, version: None, prompted: HashSet::new() })),
            dismiss_after,
            check_interval,
            reloaded: AtomicBool::new(false),
            checks_scheduled: AtomicBool::new(false),
            dismiss_task: Mutex::new(None),
            check_task: Mutex::new(None),
        }
    }

    pub fn from_config(page: Arc<dyn Page>, config: &AppConfig) -> Self {
        Self::new(page, config.update_prompt_dismiss(), config.update_check_interval())
    }

    pub fn phase(&self) -> UpdatePhase {
        lock(&self.inner).phase
    }

    /// Version currently being tracked, if any.
    pub fn pending_version(&self) -> Option<String> {
        lock(&self.inner).version.clone()
    }

    /// A new version finished installing.
    ///
    /// Returns true when it is an update (some version already controls the
    /// page) that has not been announced yet. A first install stays idle.
    pub fn on_installed(&self, version: &str, has_controller: bool) -> bool {
        if !has_controller {
            tracing::debug!(version, "first install, nothing to announce");
            return false;
        }

        let mut state = lock(&self.inner);
        if state.prompted.contains(version) {
            return false;
        }
        state.phase = UpdatePhase::WaitingForActivation;
        state.version = Some(version.to_string());
        tracing::info!(version, "update waiting for activation");
        true
    }

    /// Show the prompt and schedule its auto-dismissal.
    pub fn notify(&self) -> bool {
        let version = {
            let mut state = lock(&self.inner);
            if state.phase != UpdatePhase::WaitingForActivation {
                return false;
            }
            let Some(version) = state.version.clone() else {
                return false;
            };
            state.phase = UpdatePhase::Notified;
            state.prompted.insert(version.clone());
            version
        };

        self.page.show_update_prompt(&version);

        let inner = self.inner.clone();
        let page = self.page.clone();
        let after = self.dismiss_after;
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if dismiss_prompt(&inner, page.as_ref()) {
                tracing::debug!("update prompt auto-dismissed");
            }
        });
        if let Some(previous) = self.dismiss_task.lock().unwrap_or_else(|p| p.into_inner()).replace(task) {
            previous.abort();
        }
        true
    }

    /// User closed the prompt.
    pub fn dismiss(&self) -> bool {
        self.cancel_auto_dismiss();
        dismiss_prompt(&self.inner, self.page.as_ref())
    }

    /// User accepted the update: ask the waiting worker to activate now.
    pub async fn apply(&self, channel: &dyn WorkerChannel) -> Result<bool, Error> {
        {
            let mut state = lock(&self.inner);
            if state.phase != UpdatePhase::Notified {
                return Ok(false);
            }
            state.phase = UpdatePhase::Applied;
        }
        self.cancel_auto_dismiss();
        self.page.hide_update_prompt();

        channel.post(ControlMessage::SkipWait).await?;
        tracing::info!(version = ?self.pending_version(), "update applied");
        Ok(true)
    }

    /// A new worker took control. Reloads the page once per notifier.
    pub fn on_controller_change(&self) -> bool {
        if self.reloaded.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.page.reload();
        true
    }

    /// Start periodic update checks. Repeated calls keep the single timer.
    pub fn start_update_checks(&self, checker: Arc<dyn UpdateCheck>) -> bool {
        if self
            .checks_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let every = self.check_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match checker.check_for_update().await {
                    Ok(true) => tracing::info!("newer worker version found"),
                    Ok(false) => tracing::debug!("no worker update"),
                    Err(e) => tracing::warn!(error = %e, "update check failed"),
                }
            }
        });
        *self.check_task.lock().unwrap_or_else(|p| p.into_inner()) = Some(task);
        true
    }

    fn cancel_auto_dismiss(&self) {
        if let Some(task) = self.dismiss_task.lock().unwrap_or_else(|p| p.into_inner()).take() {
            task.abort();
        }
    }
}

impl Drop for UpdateNotifier {
    fn drop(&mut self) {
        for slot in [&self.dismiss_task, &self.check_task] {
            if let Some(task) = slot.lock().unwrap_or_else(|p| p.into_inner()).take() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingPage;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingChannel {
        posted: Mutex<Vec<ControlMessage>>,
    }

    #[async_trait]
    impl WorkerChannel for RecordingChannel {
        async fn post(&self, message: ControlMessage) -> Result<(), Error> {
            self.posted.lock().unwrap().push(message);
            Ok(())
        }
    }

    struct CountingCheck {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl UpdateCheck for CountingCheck {
        async fn check_for_update(&self) -> Result<bool, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail { Err(Error::Network("offline".into())) } else { Ok(false) }
        }
    }

    fn notifier(page: &Arc<RecordingPage>) -> UpdateNotifier {
        UpdateNotifier::new(page.clone(), Duration::from_secs(10), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_first_install_stays_idle() {
        let page = Arc::new(RecordingPage::default());
        let n = notifier(&page);

        assert!(!n.on_installed("v1", false));
        assert_eq!(n.phase(), UpdatePhase::Idle);
        assert!(!n.notify());
        assert!(page.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_prompt_auto_dismisses() {
        let page = Arc::new(RecordingPage::default());
        let n = notifier(&page);

        assert!(n.on_installed("v2", true));
        assert!(n.notify());
        assert_eq!(n.phase(), UpdatePhase::Notified);

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(n.phase(), UpdatePhase::Dismissed);
        assert_eq!(page.events(), vec!["show:v2", "hide"]);
    }

    #[tokio::test]
    async fn test_one_prompt_per_version() {
        let page = Arc::new(RecordingPage::default());
        let n = notifier(&page);

        n.on_installed("v2", true);
        n.notify();
        assert!(n.dismiss());

        assert!(!n.on_installed("v2", true));
        assert!(!n.notify());
        assert_eq!(page.events(), vec!["show:v2", "hide"]);

        assert!(n.on_installed("v3", true));
        assert!(n.notify());
    }

    #[tokio::test]
    async fn test_apply_posts_skip_wait() {
        let page = Arc::new(RecordingPage::default());
        let n = notifier(&page);
        let channel = RecordingChannel::default();

        assert!(!n.apply(&channel).await.unwrap());

        n.on_installed("v2", true);
        n.notify();
        assert!(n.apply(&channel).await.unwrap());
        assert_eq!(n.phase(), UpdatePhase::Applied);
        assert_eq!(*channel.posted.lock().unwrap(), vec![ControlMessage::SkipWait]);
        assert!(!n.dismiss());
    }

    #[tokio::test]
    async fn test_reload_at_most_once() {
        let page = Arc::new(RecordingPage::default());
        let n = notifier(&page);

        assert!(n.on_controller_change());
        assert!(!n.on_controller_change());
        assert!(!n.on_controller_change());
        assert_eq!(page.events(), vec!["reload"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_checks_single_timer() {
        let page = Arc::new(RecordingPage::default());
        let n = notifier(&page);
        let check = Arc::new(CountingCheck { calls: AtomicUsize::new(0), fail: false });

        assert!(n.start_update_checks(check.clone()));
        assert!(!n.start_update_checks(check.clone()));

        tokio::time::sleep(Duration::from_secs(125)).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_check_failures_keep_timer() {
        let page = Arc::new(RecordingPage::default());
        let n = notifier(&page);
        let check = Arc::new(CountingCheck { calls: AtomicUsize::new(0), fail: true });

        n.start_update_checks(check.clone());
        tokio::time::sleep(Duration::from_secs(185)).await;
        assert_eq!(check.calls.load(Ordering::SeqCst), 3);
    }
}
