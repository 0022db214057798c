//! # Sentinel Cache
//!
//! A single-node, in-memory key-value cache engine with durability.
//!
//! ## Architecture
//!
//! - `entry`: the node record stored in the cache (key, value, ttl, created_at)
//! - `list`: the arena-backed doubly-linked recency list (MRU → LRU ordering)
//! - `cache`: the capacity-bounded LRU cache and its public operations
//! - `crawler`: the periodic TTL mark-and-sweep task
//! - `dispatcher`: the tagged-enum command dispatcher and write-execution seam
//! - `aof`: append-only log buffering, flushing, compaction and replay
//! - `snapshot`: the gzip + AES-GCM point-in-time snapshot codec
//! - `metrics`: request counters and the periodic metrics log emitters
//! - `scheduler`: the generic interval/stop-signal background task loop
//! - `config`: engine configuration, loaded from file or defaults
//! - `paths`: resolution of the persisted-state directory layout
//! - `http`: the thin HTTP transport adapter
//! - `engine`: boot sequence and top-level wiring

#![warn(clippy::all)]

pub mod aof;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod dispatcher;
pub mod engine;
pub mod entry;
pub mod error;
pub mod http;
pub mod list;
pub mod metrics;
pub mod paths;
pub mod scheduler;
pub mod snapshot;

pub use cache::LruCache;
pub use config::Configuration;
pub use dispatcher::{Command, Dispatcher};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name, as declared in `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
