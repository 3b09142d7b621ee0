//! SQLite-backed partition store.
//!
//! Persistent storage for named cache partitions using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Versioned partition names (`{namespace}-{kind}-{version}`)
//! - Method + URL keyed entries hashed with SHA-256
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod names;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use names::{PartitionKind, PartitionNames};
pub use partitions::PartitionInfo;
