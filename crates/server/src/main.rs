//! stash worker entry point.
//!
//! Registers the configured worker version, schedules update checks and the
//! keep-alive, then serves MCP on stdio. Logging goes to stderr to avoid
//! interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use stash_client::{FetchClient, KeepAlive, Registration, UpdateNotifier};
use stash_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

use crate::updates::{ConfigVersionCheck, LogPage};

mod handler;
mod tools;
mod updates;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;
    tracing::info!(origin = %origin, version = %config.cache_version, "Starting stash worker on stdio transport");

    let cache = CacheDb::open(&config.db_path).await?;
    let fetch = FetchClient::new((&config).into())?;
    let notifier = UpdateNotifier::from_config(Arc::new(LogPage), &config);
    let registration = Arc::new(Registration::new(cache.clone(), Arc::new(fetch.clone()), notifier));

    let outcome = registration.register(&config).await?;
    tracing::info!(outcome = ?outcome, "worker registered");
    registration
        .notifier()
        .start_update_checks(Arc::new(ConfigVersionCheck::new(&registration)));

    let mut keepalive = if config.keepalive_enabled {
        let endpoint = origin.join(&config.keepalive_path)?;
        let mut keepalive = KeepAlive::new(fetch.http().clone(), endpoint, config.keepalive_interval());
        keepalive.start();
        Some(keepalive)
    } else {
        None
    };

    let handler = handler::StashServer::new(registration, cache, origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    if let Some(keepalive) = keepalive.as_mut() {
        keepalive.stop();
    }

    Ok(())
}
