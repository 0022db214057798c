//! Crate-level error aggregation.
//!
//! Each module owns a narrow `thiserror` enum for the faults it can produce.
//! `EngineError` aggregates them at the boundaries that cross module lines
//! (the dispatcher, the boot sequence) so callers there don't have to match
//! on five unrelated error types.

use thiserror::Error;

use crate::aof::AofError;
use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::snapshot::SnapshotError;

/// Top-level error type for operations that span more than one subsystem.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A cache operation failed in a way the response envelope can't express.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// AOF durability path failure.
    #[error(transparent)]
    Aof(#[from] AofError),

    /// Snapshot codec failure.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// Configuration loading failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An underlying I/O failure not already wrapped by a subsystem error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for crate-level fallible returns.
pub type EngineResult<T> = Result<T, EngineError>;
