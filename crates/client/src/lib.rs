//! Worker runtime for stash.
//!
//! This crate provides the upstream fetch client, the caching strategies,
//! partition lifecycle, the worker event dispatcher, version registration,
//! update notification and the keep-alive pinger used by the server.

pub mod fetch;
pub mod keepalive;
pub mod lifecycle;
pub mod registration;
pub mod strategy;
pub mod update;
pub mod worker;

#[cfg(test)]
mod testing;

pub use fetch::{FetchClient, FetchConfig, Network};
pub use keepalive::{HealthStatus, KeepAlive, KeepAliveState};
pub use lifecycle::{ActivateReport, CacheLifecycle, InstallReport};
pub use registration::{RegisterOutcome, Registration, RegistrationStatus};
pub use strategy::{Served, ServedFrom, Strategies};
pub use update::{Page, UpdateCheck, UpdateNotifier, UpdatePhase, WorkerChannel};
pub use worker::{ControlMessage, FetchOutcome, Worker, WorkerEvent, WorkerReply, WorkerState};
