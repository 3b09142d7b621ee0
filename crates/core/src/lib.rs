//! Core types and shared functionality for stash.
//!
//! This crate provides:
//! - Request and response models
//! - Request classification into traffic classes
//! - SQLite-backed cache partitions
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod request;
pub mod response;
pub mod route;

pub use cache::{CacheDb, PartitionKind, PartitionNames};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use request::{Destination, RequestInfo, RequestMode};
pub use response::Response;
pub use route::{RouteRules, TrafficClass, classify};
