//! Boot sequence and top-level wiring.
//!
//! Initialization order is fixed: configuration → cache → dispatcher →
//! schedulers → transport. At most one persistence path restores state at
//! boot — snapshot mode takes precedence over AOF mode if both are
//! configured.

use std::sync::Arc;
use std::time::Duration;

use crate::aof::{self, AofWriter};
use crate::cache::LruCache;
use crate::config::Configuration;
use crate::crawler;
use crate::dispatcher::{Command, Dispatcher};
use crate::error::EngineResult;
use crate::metrics::{AppMetrics, SysMetricsSampler};
use crate::paths::PersistedPaths;
use crate::scheduler::Scheduler;
use crate::snapshot;

/// The running engine: cache, dispatcher, metrics, and every background
/// scheduler, all wired together.
pub struct Engine {
    cache: Arc<LruCache>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<AppMetrics>,
    sys_metrics: Arc<SysMetricsSampler>,
    config: Configuration,
    paths: PersistedPaths,
    schedulers: Vec<Scheduler>,
}

impl Engine {
    /// Boot the engine: restore state if a persisted artifact exists,
    /// then start every configured background task.
    pub async fn boot(config: Configuration, paths: PersistedPaths) -> EngineResult<Self> {
        config.validate()?;

        let cache = Arc::new(Self::restore_or_fresh(&config, &paths)?);

        let aof_writer = if config.persistence_aof {
            Some(Arc::new(AofWriter::open(
                paths.aof_log.clone(),
                paths.aof_tmp.clone(),
                config.aof_max_bytes,
            )?))
        } else {
            None
        };

        let metrics = Arc::new(AppMetrics::default());
        let sys_metrics = Arc::new(SysMetricsSampler::new());
        let dispatcher = Arc::new(Dispatcher::new(
            cache.clone(),
            aof_writer.clone(),
            metrics.clone(),
        ));

        let mut schedulers = Vec::new();

        {
            let cache = cache.clone();
            let interval = Duration::from_secs(config.crawler_interval);
            schedulers.push(Scheduler::start("crawler", interval, move || {
                crawler::sweep_expired(&cache);
            })?);
        }

        if let Some(writer) = aof_writer.clone() {
            let cache = cache.clone();
            schedulers.push(Scheduler::start(
                "aof-flusher",
                Duration::from_secs(1),
                move || {
                    if let Err(err) = writer.tick(&cache) {
                        tracing::error!(error = %err, "aof flush/compaction failed");
                    }
                },
            )?);
        }

        if config.snapshot_enabled {
            let cache = cache.clone();
            let snapshot_path = paths.snapshot.clone();
            let encryption = config.enable_encryption;
            let passphrase = config.passphrase.clone();
            let interval = Duration::from_secs(config.snapshot_interval);
            schedulers.push(Scheduler::start("snapshotter", interval, move || {
                if let Err(err) = snapshot::create(&cache, &snapshot_path, encryption, &passphrase) {
                    tracing::error!(error = %err, "snapshot creation failed");
                }
            })?);
        }

        {
            let metrics = metrics.clone();
            let log_path = paths.app_metrics_log.clone();
            let tmp_path = paths.app_metrics_tmp.clone();
            let with_timestamp = config.entry_timestamp;
            let interval = Duration::from_secs(config.app_metric_interval);
            schedulers.push(Scheduler::start("app-metrics", interval, move || {
                if let Err(err) = metrics.emit(&log_path, &tmp_path, with_timestamp) {
                    tracing::error!(error = %err, "app metrics emission failed");
                }
            })?);
        }

        {
            let sys_metrics = sys_metrics.clone();
            let log_path = paths.sys_metrics_log.clone();
            let tmp_path = paths.sys_metrics_tmp.clone();
            let interval = Duration::from_secs(config.sys_metric_interval);
            schedulers.push(Scheduler::start("sys-metrics", interval, move || {
                if let Err(err) = sys_metrics.emit(&log_path, &tmp_path) {
                    tracing::error!(error = %err, "system metrics emission failed");
                }
            })?);
        }

        Ok(Self {
            cache,
            dispatcher,
            metrics,
            sys_metrics,
            config,
            paths,
            schedulers,
        })
    }

    fn restore_or_fresh(config: &Configuration, paths: &PersistedPaths) -> EngineResult<LruCache> {
        if config.snapshot_enabled && paths.snapshot.exists() {
            tracing::info!(path = %paths.snapshot.display(), "restoring cache from snapshot");
            return Ok(snapshot::restore(
                &paths.snapshot,
                config.enable_encryption,
                &config.passphrase,
            )?);
        }
        if config.persistence_aof && AofWriter::exists(&paths.aof_log) {
            tracing::info!(path = %paths.aof_log.display(), "replaying cache from aof");
            let cache = LruCache::new(config.keyspace_size)?;
            aof::replay(&paths.aof_log, &cache)?;
            return Ok(cache);
        }
        Ok(LruCache::new(config.keyspace_size)?)
    }

    /// The dispatcher, the single entry point for every client command.
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// The configuration the engine booted with.
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// The underlying cache, exposed for transports that need direct reads
    /// (e.g. `getAppMetrics`/`getSysMetrics`, which read log files rather
    /// than going through the cache).
    pub fn cache(&self) -> Arc<LruCache> {
        self.cache.clone()
    }

    /// Read back the app-metrics log, for the `getAppMetrics` command.
    pub fn read_app_metrics(&self) -> EngineResult<Vec<serde_json::Value>> {
        Ok(AppMetrics::read_log(&self.paths.app_metrics_log)?)
    }

    /// Read back the system-metrics log, for the `getSysMetrics` command.
    pub fn read_sys_metrics(&self) -> EngineResult<Vec<serde_json::Value>> {
        Ok(SysMetricsSampler::read_log(&self.paths.sys_metrics_log)?)
    }

    /// Dispatch one wire-level command.
    pub fn handle(&self, request: crate::dispatcher::CommandRequest) -> crate::cache::CacheResponse {
        match Command::parse(&request) {
            Ok(cmd) => self.dispatcher.dispatch(cmd),
            Err(verb) => Dispatcher::bad_command(&verb),
        }
    }

    /// Stop every background scheduler, letting in-flight ticks complete.
    pub async fn shutdown(self) {
        for scheduler in self.schedulers {
            scheduler.stop().await;
        }
    }
}

impl From<crate::metrics::MetricsError> for crate::error::EngineError {
    fn from(err: crate::metrics::MetricsError) -> Self {
        crate::error::EngineError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
    }
}

impl From<crate::scheduler::SchedulerError> for crate::error::EngineError {
    fn from(err: crate::scheduler::SchedulerError) -> Self {
        crate::error::EngineError::Io(std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::CommandRequest;

    async fn test_engine(config_overrides: impl FnOnce(&mut Configuration)) -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let paths = PersistedPaths::resolve_under(dir.path()).unwrap();
        let mut config = Configuration {
            keyspace_size: 16,
            crawler_interval: 3600,
            snapshot_interval: 3600,
            snapshot_enabled: false,
            persistence_aof: false,
            app_metric_interval: 3600,
            sys_metric_interval: 3600,
            ..Configuration::default()
        };
        config_overrides(&mut config);
        let engine = Engine::boot(config, paths).await.unwrap();
        (engine, dir)
    }

    #[tokio::test]
    async fn boots_fresh_when_nothing_persisted() {
        let (engine, _dir) = test_engine(|_| {}).await;
        let response = engine.handle(CommandRequest {
            verb: "nodeSize".to_string(),
            key: None,
            value: None,
            ttl: None,
        });
        assert_eq!(response.gobj.ttl.unwrap(), 0);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_command_yields_bad_command_response() {
        let (engine, _dir) = test_engine(|_| {}).await;
        let response = engine.handle(CommandRequest {
            verb: "nope".to_string(),
            key: None,
            value: None,
            ttl: None,
        });
        assert_eq!(response.error, crate::cache::INVALID_COMMAND_ERR);
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn restores_from_snapshot_on_reboot_s6() {
        let dir = tempfile::tempdir().unwrap();
        let paths = PersistedPaths::resolve_under(dir.path()).unwrap();
        let config = Configuration {
            keyspace_size: 65536,
            crawler_interval: 3600,
            snapshot_interval: 3600,
            snapshot_enabled: true,
            persistence_aof: false,
            enable_encryption: true,
            passphrase: "SUPPLY_PASSPHRASE".to_string(),
            app_metric_interval: 3600,
            sys_metric_interval: 3600,
            ..Configuration::default()
        };

        let cache = LruCache::new(config.keyspace_size).unwrap();
        cache.put("Italy", "Rome", -1);
        cache.put("England", "London", 2);
        crate::snapshot::create(
            &cache,
            &paths.snapshot,
            config.enable_encryption,
            &config.passphrase,
        )
        .unwrap();

        let engine = Engine::boot(config, paths).await.unwrap();
        let response = engine.handle(CommandRequest {
            verb: "get".to_string(),
            key: Some("England".to_string()),
            value: None,
            ttl: None,
        });
        assert_eq!(response.gobj.value.unwrap(), "London");
        engine.shutdown().await;
    }
}
