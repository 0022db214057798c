//! Resolution of the persisted-state directory layout.
//!
//! Everything the engine writes lives under `ghostdb/` inside the user's
//! platform config directory. Every log file has a sibling `_tmp` path used
//! for rotation and compaction.

use std::path::{Path, PathBuf};

use thiserror::Error;

const STATE_DIR: &str = "ghostdb";

/// Errors resolving or preparing the persisted-state directory.
#[derive(Error, Debug)]
pub enum PathsError {
    /// The platform has no resolvable user config directory.
    #[error("could not determine the user config directory")]
    NoConfigDir,

    /// The state directory could not be created.
    #[error("failed to create state directory {}: {source}", path.display())]
    Create {
        /// The directory that failed to create.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Fully-resolved paths for every artifact the engine persists.
#[derive(Debug, Clone)]
pub struct PersistedPaths {
    /// `ghostdb/` inside the user config directory.
    pub root: PathBuf,
    /// The append-only log.
    pub aof_log: PathBuf,
    /// The compaction scratch copy of the AOF log.
    pub aof_tmp: PathBuf,
    /// The latest point-in-time snapshot.
    pub snapshot: PathBuf,
    /// The application-metrics log.
    pub app_metrics_log: PathBuf,
    /// Rotation scratch copy of the application-metrics log.
    pub app_metrics_tmp: PathBuf,
    /// The system-metrics log.
    pub sys_metrics_log: PathBuf,
    /// Rotation scratch copy of the system-metrics log.
    pub sys_metrics_tmp: PathBuf,
}

impl PersistedPaths {
    /// Resolve paths under the platform's user config directory, creating
    /// the `ghostdb/` directory if it doesn't already exist.
    pub fn resolve() -> Result<Self, PathsError> {
        let config_dir = dirs::config_dir().ok_or(PathsError::NoConfigDir)?;
        Self::resolve_under(&config_dir)
    }

    /// Resolve paths under an explicit base directory — the seam tests use
    /// to avoid touching the real user config directory.
    pub fn resolve_under(base: &Path) -> Result<Self, PathsError> {
        let root = base.join(STATE_DIR);
        std::fs::create_dir_all(&root).map_err(|source| PathsError::Create {
            path: root.clone(),
            source,
        })?;

        Ok(Self {
            aof_log: root.join("ghostDBPersistence.log"),
            aof_tmp: root.join("temp_ghostDBPersistence.log"),
            snapshot: root.join("snapshot.gz"),
            app_metrics_log: root.join("ghostdb_appMetrics.log"),
            app_metrics_tmp: root.join("ghostdb_appMetrics_tmp.log"),
            sys_metrics_log: root.join("ghostdb_sys_metrics.log"),
            sys_metrics_tmp: root.join("ghostdb_sys_metrics_tmp.log"),
            root,
        })
    }
}
