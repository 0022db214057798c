//! Engine configuration: the enumerated knobs, their defaults, and a
//! file-or-defaults loader.
//!
//! A missing or unparsable config file is not fatal, it just falls back to
//! [`Configuration::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be parsed as JSON.
    #[error("failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    /// `enable_encryption` is set but no passphrase was supplied.
    #[error("encryption is enabled but no passphrase was configured")]
    MissingPassphrase,
}

/// Engine configuration, loaded from a JSON file or defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Maximum number of entries the cache will hold.
    pub keyspace_size: usize,
    /// Seconds between system-metric samples.
    pub sys_metric_interval: u64,
    /// Seconds between app-metric log emissions.
    pub app_metric_interval: u64,
    /// Default TTL (seconds) applied where a request omits one; `-1` means
    /// never expires.
    pub default_ttl: i64,
    /// Seconds between TTL crawler passes.
    pub crawler_interval: u64,
    /// Seconds between snapshots.
    pub snapshot_interval: u64,
    /// Whether periodic snapshotting is active.
    pub snapshot_enabled: bool,
    /// Whether AOF durability is active.
    pub persistence_aof: bool,
    /// AOF size threshold, in bytes, that triggers compaction.
    pub aof_max_bytes: u64,
    /// Whether metrics log lines carry a timestamp.
    pub entry_timestamp: bool,
    /// Whether snapshots are AES-GCM sealed.
    pub enable_encryption: bool,
    /// Passphrase used to derive the snapshot encryption key. Required when
    /// `enable_encryption` is true.
    pub passphrase: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            keyspace_size: 65536,
            sys_metric_interval: 300,
            app_metric_interval: 300,
            default_ttl: -1,
            crawler_interval: 300,
            snapshot_interval: 3600,
            snapshot_enabled: true,
            persistence_aof: false,
            aof_max_bytes: 50_000_000,
            entry_timestamp: true,
            enable_encryption: true,
            passphrase: "SUPPLY_ME".to_string(),
        }
    }
}

impl Configuration {
    /// Load configuration from `path`, falling back to defaults if the file
    /// is absent or fails to parse. A malformed file is logged and treated
    /// the same as a missing one — only [`Configuration::validate`]'s
    /// contract (passphrase present when encryption is enabled) is hard.
    pub fn load_or_default(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(config) => config,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "configuration file failed to parse, using defaults"
                    );
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!(
                    path = %path.display(),
                    "no configuration file found, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Validate invariants that [`Self::load_or_default`] can't enforce by
    /// construction (a passphrase can legitimately be an empty string in
    /// JSON even though that's useless once encryption is on).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_encryption && self.passphrase.is_empty() {
            return Err(ConfigError::MissingPassphrase);
        }
        Ok(())
    }
}
