//! Request counters and the periodic metrics log emitters.
//!
//! Two independent streams exist: the app-metrics aggregator (per-verb
//! request counters) and a system-metrics sampler (process-level numbers).
//! Both emit one JSON line per tick to their own log file and share the
//! same rotate-when-too-big helper.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

/// Default per-file size threshold (bytes) before a log rotates.
pub const MAX_LOG_SIZE: u64 = 500_000;

/// Errors surfaced by metrics log emission and rotation.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Underlying file I/O failure.
    #[error("metrics i/o error on {}: {source}", path.display())]
    Io {
        /// The path the failing operation targeted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> MetricsError {
    MetricsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Copy `path`'s current contents into `tmp_path`, then truncate `path` to
/// empty, when `path` exceeds `threshold` bytes. A no-op otherwise.
pub fn rotate_if_needed(path: &Path, tmp_path: &Path, threshold: u64) -> Result<bool, MetricsError> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size <= threshold {
        return Ok(false);
    }
    std::fs::copy(path, tmp_path).map_err(|e| io_err(tmp_path, e))?;
    std::fs::write(path, b"").map_err(|e| io_err(path, e))?;
    Ok(true)
}

/// Monotonic request counters, incremented per dispatched command.
#[derive(Default)]
pub struct AppMetrics {
    total_requests: AtomicU64,
    get_requests: AtomicU64,
    put_requests: AtomicU64,
    add_requests: AtomicU64,
    delete_requests: AtomicU64,
    flush_requests: AtomicU64,
    cache_miss: AtomicU64,
    stored: AtomicU64,
    not_stored: AtomicU64,
    removed: AtomicU64,
    not_found: AtomicU64,
    flushed: AtomicU64,
    err_flush: AtomicU64,
}

/// One JSON line's worth of counter values, the shape written to the
/// app-metrics log and returned by `getAppMetrics`.
#[derive(Debug, Serialize)]
pub struct AppMetricsSample {
    /// Present only when `entry_timestamp` is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub total_requests: u64,
    pub get_requests: u64,
    pub put_requests: u64,
    pub add_requests: u64,
    pub delete_requests: u64,
    pub flush_requests: u64,
    pub cache_miss: u64,
    pub stored: u64,
    pub not_stored: u64,
    pub removed: u64,
    pub not_found: u64,
    pub flushed: u64,
    pub err_flush: u64,
}

impl AppMetrics {
    /// Record a dispatched command and its cache response.
    pub fn record(&self, verb: &str, response: &crate::cache::CacheResponse) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        match verb {
            "get" => {
                self.get_requests.fetch_add(1, Ordering::Relaxed);
                if response.message == crate::cache::CACHE_MISS {
                    self.cache_miss.fetch_add(1, Ordering::Relaxed);
                }
            }
            "put" => {
                self.put_requests.fetch_add(1, Ordering::Relaxed);
                self.stored.fetch_add(1, Ordering::Relaxed);
            }
            "add" => {
                self.add_requests.fetch_add(1, Ordering::Relaxed);
                if response.message == crate::cache::STORED {
                    self.stored.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.not_stored.fetch_add(1, Ordering::Relaxed);
                }
            }
            "delete" => {
                self.delete_requests.fetch_add(1, Ordering::Relaxed);
                if response.message == crate::cache::REMOVED {
                    self.removed.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.not_found.fetch_add(1, Ordering::Relaxed);
                }
            }
            "flush" => {
                self.flush_requests.fetch_add(1, Ordering::Relaxed);
                if response.message == crate::cache::FLUSH {
                    self.flushed.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.err_flush.fetch_add(1, Ordering::Relaxed);
                }
            }
            _ => {}
        }
    }

    /// Snapshot the current counter values, optionally stamped with a
    /// timestamp (`entry_timestamp` configuration knob).
    pub fn sample(&self, with_timestamp: bool) -> AppMetricsSample {
        AppMetricsSample {
            time: with_timestamp.then(|| chrono::Local::now().to_rfc3339()),
            total_requests: self.total_requests.load(Ordering::Relaxed),
            get_requests: self.get_requests.load(Ordering::Relaxed),
            put_requests: self.put_requests.load(Ordering::Relaxed),
            add_requests: self.add_requests.load(Ordering::Relaxed),
            delete_requests: self.delete_requests.load(Ordering::Relaxed),
            flush_requests: self.flush_requests.load(Ordering::Relaxed),
            cache_miss: self.cache_miss.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            not_stored: self.not_stored.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            not_found: self.not_found.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
            err_flush: self.err_flush.load(Ordering::Relaxed),
        }
    }

    /// Append one JSON line to `path`, rotating first if it's grown past
    /// `MAX_LOG_SIZE`.
    pub fn emit(&self, path: &Path, tmp_path: &Path, with_timestamp: bool) -> Result<(), MetricsError> {
        rotate_if_needed(path, tmp_path, MAX_LOG_SIZE)?;
        let line = serde_json::to_string(&self.sample(with_timestamp))
            .expect("AppMetricsSample serialization is infallible");
        append_line(path, &line)
    }

    /// Read back every JSON line in the app-metrics log, for `getAppMetrics`.
    pub fn read_log(path: &Path) -> Result<Vec<serde_json::Value>, MetricsError> {
        read_json_lines(path)
    }
}

fn append_line(path: &Path, line: &str) -> Result<(), MetricsError> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))?;
    writeln!(file, "{line}").map_err(|e| io_err(path, e))
}

fn read_json_lines(path: &Path) -> Result<Vec<serde_json::Value>, MetricsError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Ok(Vec::new()),
    };
    Ok(contents
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}

/// A single system-metrics sample. Best-effort: resident memory is only
/// available on Linux, where it's read from `/proc/self/statm`.
#[derive(Debug, Serialize)]
pub struct SysMetricsSample {
    pub uptime_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resident_memory_bytes: Option<u64>,
}

/// Samples process-level telemetry on a fixed interval: uptime and, on
/// Linux, resident memory. Ambient operational telemetry rather than a
/// cache feature, emitted on the same periodic-log pattern as app metrics.
pub struct SysMetricsSampler {
    boot: Instant,
}

impl SysMetricsSampler {
    /// Construct a sampler whose uptime clock starts now.
    pub fn new() -> Self {
        Self { boot: Instant::now() }
    }

    /// Take one sample.
    pub fn sample(&self) -> SysMetricsSample {
        SysMetricsSample {
            uptime_seconds: self.boot.elapsed().as_secs(),
            resident_memory_bytes: resident_memory_bytes(),
        }
    }

    /// Append one JSON line to `path`, rotating first if needed.
    pub fn emit(&self, path: &Path, tmp_path: &Path) -> Result<(), MetricsError> {
        rotate_if_needed(path, tmp_path, MAX_LOG_SIZE)?;
        let line = serde_json::to_string(&self.sample())
            .expect("SysMetricsSample serialization is infallible");
        append_line(path, &line)
    }

    /// Read back every JSON line in the system-metrics log, for `getSysMetrics`.
    pub fn read_log(path: &Path) -> Result<Vec<serde_json::Value>, MetricsError> {
        read_json_lines(path)
    }
}

impl Default for SysMetricsSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "linux")]
fn resident_memory_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_bytes() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheObject, CacheResponse};

    #[test]
    fn counters_increment_per_verb() {
        let metrics = AppMetrics::default();
        let stored = CacheResponse {
            gobj: CacheObject::default(),
            status: 1,
            message: crate::cache::STORED.to_string(),
            error: String::new(),
        };
        metrics.record("put", &stored);
        let sample = metrics.sample(false);
        assert_eq!(sample.total_requests, 1);
        assert_eq!(sample.put_requests, 1);
        assert_eq!(sample.stored, 1);
    }

    #[test]
    fn rotation_copies_then_truncates_when_over_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.log");
        let tmp = dir.path().join("m_tmp.log");
        std::fs::write(&path, vec![b'x'; 100]).unwrap();

        let rotated = rotate_if_needed(&path, &tmp, 10).unwrap();
        assert!(rotated);
        assert_eq!(std::fs::metadata(&tmp).unwrap().len(), 100);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn rotation_is_a_no_op_under_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.log");
        let tmp = dir.path().join("m_tmp.log");
        std::fs::write(&path, vec![b'x'; 5]).unwrap();

        let rotated = rotate_if_needed(&path, &tmp, 10).unwrap();
        assert!(!rotated);
        assert!(!tmp.exists());
    }

    #[test]
    fn emit_then_read_log_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let tmp = dir.path().join("app_tmp.log");
        let metrics = AppMetrics::default();
        metrics.emit(&path, &tmp, false).unwrap();
        metrics.emit(&path, &tmp, false).unwrap();

        let lines = AppMetrics::read_log(&path).unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn sys_metrics_sample_reports_uptime() {
        let sampler = SysMetricsSampler::new();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let sample = sampler.sample();
        assert!(sample.uptime_seconds < 2);
    }
}
