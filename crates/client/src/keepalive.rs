//! Periodic health ping that keeps the backend warm.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use url::Url;

/// Body of the health endpoint. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeepAliveState {
    Stopped,
    Running,
}

/// At most one background ping task per instance.
pub struct KeepAlive {
    http: Client,
    endpoint: Url,
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl KeepAlive {
    pub fn new(http: Client, endpoint: Url, interval: Duration) -> Self {
        Self { http, endpoint, interval, task: None }
    }

    /// Start pinging: once now, then every interval. No-op while running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }

        let http = self.http.clone();
        let endpoint = self.endpoint.clone();
        let every = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                probe(&http, &endpoint).await;
            }
        }));

        tracing::info!(endpoint = %self.endpoint, interval_secs = self.interval.as_secs(), "keep-alive started");
        true
    }

    /// Stop pinging. Safe to call when already stopped.
    pub fn stop(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                tracing::info!("keep-alive stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn state(&self) -> KeepAliveState {
        if self.is_running() { KeepAliveState::Running } else { KeepAliveState::Stopped }
    }

    /// One ping outside the schedule.
    pub async fn probe(&self) -> Option<HealthStatus> {
        probe(&self.http, &self.endpoint).await
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Failures are logged and swallowed.
async fn probe(http: &Client, endpoint: &Url) -> Option<HealthStatus> {
    let response = match http.get(endpoint.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "keep-alive ping failed");
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(endpoint = %endpoint, status = status.as_u16(), "keep-alive ping returned error status");
        return None;
    }

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "keep-alive body unreadable");
            return None;
        }
    };
    tracing::debug!(body = %body, "keep-alive response");

    match serde_json::from_str::<HealthStatus>(&body) {
        Ok(health) => {
            tracing::info!(status = ?health.status, timestamp = ?health.timestamp, "keep-alive ok");
            Some(health)
        }
        Err(e) => {
            tracing::warn!(endpoint = %endpoint, error = %e, "keep-alive response is not valid JSON");
            None
        }
    }
}
