//! Caching strategies.
//!
//! Three policies over a named partition:
//!
//! - **network first**: live response wins and is stored; the partition (then
//!   any fallback paths) answers only when the network fails.
//! - **cache first**: a stored entry is returned without touching the
//!   network; misses are fetched and stored when successful.
//! - **network with fallback**: live response, partition lookup on failure,
//!   never stores.
//!
//! Storage errors never fail a request. A response that is both stored and
//! returned is duplicated first.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stash_core::{CacheDb, Error, RequestInfo, Response};

use crate::fetch::Network;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServedFrom {
    Network,
    Cache,
    /// A fallback path's entry stood in for the requested key.
    Fallback,
}

impl fmt::Display for ServedFrom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServedFrom::Network => "network",
            ServedFrom::Cache => "cache",
            ServedFrom::Fallback => "fallback",
        };
        f.write_str(s)
    }
}

/// A response plus its provenance.
#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: ServedFrom,
}

impl Served {
    fn network(response: Response) -> Self {
        Self { response, source: ServedFrom::Network }
    }

    fn cache(response: Response) -> Self {
        Self { response, source: ServedFrom::Cache }
    }
}

/// Strategy executor bound to one network and one partition store.
#[derive(Clone)]
pub struct Strategies {
    network: Arc<dyn Network>,
    db: CacheDb,
}

impl Strategies {
    pub fn new(network: Arc<dyn Network>, db: CacheDb) -> Self {
        Self { network, db }
    }

    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Network first, storing successful GET responses into `partition`.
    ///
    /// On network failure the exact key is looked up, then each of
    /// `fallbacks` (root-relative paths on the request's origin) in order.
    pub async fn network_first(
        &self, partition: &str, request: &RequestInfo, fallbacks: &[String],
    ) -> Result<Served, Error> {
        self.network_first_across(partition, &[], request, fallbacks).await
    }

    /// Like [`Strategies::network_first`], but offline lookups also search
    /// `also` after `partition`, for every key in turn.
    ///
    /// Writes still go to `partition` only.
    pub async fn network_first_across(
        &self, partition: &str, also: &[String], request: &RequestInfo, fallbacks: &[String],
    ) -> Result<Served, Error> {
        let network_err = match self.network.fetch(request).await {
            Ok(response) => {
                if request.is_get() && response.is_success() {
                    self.store(partition, request, response.duplicate()).await;
                }
                return Ok(Served::network(response));
            }
            Err(e) => e,
        };

        tracing::debug!(url = %request.url, error = %network_err, partition, "network failed, trying cache");

        let searched: Vec<&str> = std::iter::once(partition).chain(also.iter().map(String::as_str)).collect();

        if let Some(response) = self.lookup_any(&searched, request).await {
            return Ok(Served::cache(response));
        }

        for path in fallbacks {
            let fallback = match request.with_path(path) {
                Ok(fallback) => fallback.with_method("GET"),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "skipping unusable fallback path");
                    continue;
                }
            };
            if let Some(response) = self.lookup_any(&searched, &fallback).await {
                tracing::debug!(url = %request.url, fallback = %fallback.url, "serving fallback entry");
                return Ok(Served { response, source: ServedFrom::Fallback });
            }
        }

        Err(Error::Offline(format!("{} {}: {network_err}", request.method, request.url)))
    }

    /// Cache first. Hits never touch the network; only 2xx misses are stored.
    pub async fn cache_first(&self, partition: &str, request: &RequestInfo) -> Result<Served, Error> {
        if let Some(response) = self.lookup(partition, request).await {
            tracing::debug!(url = %request.url, partition, "cache hit");
            return Ok(Served::cache(response));
        }

        let response = self.network.fetch(request).await?;
        if request.is_get() && response.is_success() {
            self.store(partition, request, response.duplicate()).await;
        } else {
            tracing::debug!(url = %request.url, status = response.status, "not caching response");
        }
        Ok(Served::network(response))
    }

    /// Network, with a read-only partition lookup on failure.
    pub async fn network_with_fallback(&self, partition: &str, request: &RequestInfo) -> Result<Served, Error> {
        match self.network.fetch(request).await {
            Ok(response) => Ok(Served::network(response)),
            Err(network_err) => match self.lookup(partition, request).await {
                Some(response) => Ok(Served::cache(response)),
                None => Err(network_err),
            },
        }
    }

    /// Partition read; storage errors are logged and read as a miss.
    async fn lookup(&self, partition: &str, request: &RequestInfo) -> Option<Response> {
        if !request.is_get() {
            return None;
        }
        match self.db.match_entry(partition, &request.method, &request.url).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(partition, url = %request.url, error = %e, "cache read failed");
                None
            }
        }
    }

    /// First hit across `partitions`, in order.
    async fn lookup_any(&self, partitions: &[&str], request: &RequestInfo) -> Option<Response> {
        for partition in partitions {
            if let Some(response) = self.lookup(partition, request).await {
                return Some(response);
            }
        }
        None
    }

    /// Partition write; storage errors are logged and dropped.
    async fn store(&self, partition: &str, request: &RequestInfo, response: Response) {
        if let Err(e) = self.db.put_entry(partition, &request.method, &response).await {
            tracing::warn!(partition, url = %request.url, error = %e, "cache write failed");
        }
    }
}
