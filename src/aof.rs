//! Append-only file durability: buffering, periodic flush, size-triggered
//! compaction, and replay on boot.
//!
//! The buffer is a process-wide (but engine-scoped, never a `static`) byte
//! accumulator; cache-write operations are producers, the periodic flusher
//! task is the sole consumer. Compaction rewrites the log as a minimal
//! sequence of synthetic `add` records while a secondary "dual-write" buffer
//! captures anything written during the rewrite, appended once the
//! replacement file is in place.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::LruCache;

/// Placeholder value the original format uses for fields a record doesn't carry.
const NA: &str = "NA";

/// Errors surfaced by the AOF path.
#[derive(Error, Debug)]
pub enum AofError {
    /// A file-open/append/rename failure on the hot path. Per the error
    /// taxonomy this is fatal — the operator has misconfigured permissions
    /// or disk space, and there is no safe way to keep serving writes that
    /// can't be durably recorded.
    #[error("aof i/o error on {}: {source}", path.display())]
    Io {
        /// The path the failing operation targeted.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn io_err(path: &Path, source: std::io::Error) -> AofError {
    AofError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LogRecord {
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Verb")]
    verb: String,
    #[serde(rename = "Key")]
    key: String,
    #[serde(rename = "Value")]
    value: String,
    #[serde(rename = "TTL")]
    ttl: String,
}

fn header_line() -> String {
    format!(
        "---Created: {}---\n",
        chrono::Local::now().format("%A, %d-%b-%y %H:%M:%S %Z")
    )
}

fn record_line(verb: &str, key: &str, value: &str, ttl: i64) -> String {
    let record = LogRecord {
        time: chrono::Local::now().format("%A, %d-%b-%y %H:%M:%S %Z").to_string(),
        verb: verb.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        ttl: ttl.to_string(),
    };
    format!(
        "{}\n",
        serde_json::to_string(&record).expect("LogRecord serialization is infallible")
    )
}

/// The append-only log writer: in-memory buffer, periodic flush, and
/// size-triggered compaction.
pub struct AofWriter {
    log_path: PathBuf,
    tmp_path: PathBuf,
    max_bytes: u64,
    buffer: Mutex<String>,
    dual_write: Mutex<Option<String>>,
}

impl AofWriter {
    /// Open (creating with a header if absent) the log at `log_path`. `tmp_path`
    /// is the scratch file compaction rewrites into before the atomic rename.
    pub fn open(log_path: PathBuf, tmp_path: PathBuf, max_bytes: u64) -> Result<Self, AofError> {
        if !log_path.exists() {
            std::fs::write(&log_path, header_line()).map_err(|e| io_err(&log_path, e))?;
        }
        Ok(Self {
            log_path,
            tmp_path,
            max_bytes,
            buffer: Mutex::new(String::new()),
            dual_write: Mutex::new(None),
        })
    }

    /// Whether a log file exists at the configured path — the boot sequence
    /// uses this to choose between a fresh cache and an AOF replay.
    pub fn exists(log_path: &Path) -> bool {
        log_path.exists()
    }

    /// Append a `put`/`add`/`delete` record to the buffer.
    pub fn record_write(&self, verb: &str, key: &str, value: &str, ttl: i64) {
        self.append(record_line(verb, key, value, ttl));
    }

    /// Append a `flush` record, which carries placeholder fields.
    pub fn record_flush(&self) {
        self.append(record_line("flush", NA, NA, -1));
    }

    fn append(&self, line: String) {
        self.buffer.lock().push_str(&line);
        if let Some(dual) = self.dual_write.lock().as_mut() {
            dual.push_str(&line);
        }
    }

    /// Called once per flusher tick: drain the buffer to disk in order,
    /// then compact if the log has grown past `max_bytes`.
    pub fn tick(&self, cache: &LruCache) -> Result<(), AofError> {
        self.flush_buffer()?;
        let size = std::fs::metadata(&self.log_path)
            .map_err(|e| io_err(&self.log_path, e))?
            .len();
        if size > self.max_bytes {
            self.compact(cache)?;
        }
        Ok(())
    }

    fn flush_buffer(&self) -> Result<(), AofError> {
        let batch = std::mem::take(&mut *self.buffer.lock());
        if batch.is_empty() {
            return Ok(());
        }
        self.append_to_log(&batch)
    }

    fn append_to_log(&self, content: &str) -> Result<(), AofError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(|e| io_err(&self.log_path, e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| io_err(&self.log_path, e))
    }

    /// Rewrite the log as a minimal sequence of synthetic `add` records
    /// reflecting the live cache, preserving any records produced
    /// concurrently via the dual-write buffer.
    fn compact(&self, cache: &LruCache) -> Result<(), AofError> {
        *self.dual_write.lock() = Some(String::new());

        let mut rewritten = header_line();
        for node in cache.snapshot_entries() {
            rewritten.push_str(&record_line("add", &node.key, &node.value, node.ttl));
        }
        std::fs::write(&self.tmp_path, rewritten).map_err(|e| io_err(&self.tmp_path, e))?;
        std::fs::rename(&self.tmp_path, &self.log_path).map_err(|e| io_err(&self.log_path, e))?;

        let captured = self.dual_write.lock().take().unwrap_or_default();
        if !captured.is_empty() {
            self.append_to_log(&captured)?;
        }
        Ok(())
    }

    /// Current on-disk size of the log, in bytes.
    pub fn log_size(&self) -> Result<u64, AofError> {
        Ok(std::fs::metadata(&self.log_path)
            .map_err(|e| io_err(&self.log_path, e))?
            .len())
    }
}

/// Replay `log_path` into `cache`, skipping the header line and any
/// malformed record. Uses the same in-process cache operations live writes
/// use, so `created_at` is stamped at replay time rather than carried
/// forward from the original record — TTL countdowns restart from the
/// replay moment. This is an accepted limitation (see DESIGN.md).
pub fn replay(log_path: &Path, cache: &LruCache) -> Result<(), AofError> {
    if !log_path.exists() {
        return Ok(());
    }
    let file = std::fs::File::open(log_path).map_err(|e| io_err(log_path, e))?;
    let mut lines = std::io::BufReader::new(file).lines();
    lines.next(); // header

    for line in lines {
        let line = line.map_err(|e| io_err(log_path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let Ok(record) = serde_json::from_str::<LogRecord>(&line) else {
            tracing::warn!(line = %line, "skipping malformed aof record");
            continue;
        };
        let Ok(ttl) = record.ttl.parse::<i64>() else {
            tracing::warn!(record = ?record, "skipping aof record with unparsable ttl");
            continue;
        };
        match record.verb.as_str() {
            "put" => {
                cache.put(&record.key, &record.value, ttl);
            }
            "add" => {
                cache.add(&record.key, &record.value, ttl);
            }
            "delete" => {
                cache.delete(&record.key);
            }
            "flush" => {
                cache.flush();
            }
            other => {
                tracing::warn!(verb = other, "skipping aof record with unknown verb");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_header_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("aof.log");
        let tmp = dir.path().join("aof.tmp");
        AofWriter::open(log.clone(), tmp, 1_000_000).unwrap();
        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.starts_with("---Created:"));
    }

    #[test]
    fn flush_tick_appends_buffered_records() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("aof.log");
        let tmp = dir.path().join("aof.tmp");
        let writer = AofWriter::open(log.clone(), tmp, 1_000_000).unwrap();
        let cache = LruCache::new(16).unwrap();

        writer.record_write("put", "k", "v", -1);
        writer.tick(&cache).unwrap();

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("\"Verb\":\"put\""));
        assert!(contents.contains("\"Key\":\"k\""));
    }

    #[test]
    fn compaction_rewrites_as_synthetic_adds_and_preserves_concurrent_writes() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("aof.log");
        let tmp = dir.path().join("aof.tmp");
        let writer = AofWriter::open(log.clone(), tmp, 10).unwrap();
        let cache = LruCache::new(16).unwrap();

        cache.put("Key1", "NewValue1", -1);
        writer.record_write("put", "Key1", "NewValue1", -1);
        writer.tick(&cache).unwrap(); // over threshold, triggers compaction

        let contents = std::fs::read_to_string(&log).unwrap();
        assert!(contents.contains("\"Verb\":\"add\""));
        assert!(contents.contains("\"Key\":\"Key1\""));
    }

    #[test]
    fn replay_rebuilds_state_and_skips_malformed_lines_s5() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("aof.log");

        let mut contents = header_line();
        contents.push_str(&record_line("put", "Key1", "NewValue1", -1));
        contents.push_str("not even json\n");
        contents.push_str(&record_line("put", "Key2", "Other", 30));
        contents.push_str(&record_line("delete", "Key2", NA, -1));
        std::fs::write(&log, contents).unwrap();

        let cache = LruCache::new(16).unwrap();
        replay(&log, &cache).unwrap();

        assert_eq!(cache.get("Key1").gobj.value.unwrap(), "NewValue1");
        assert_eq!(cache.get("Key2").message, crate::cache::CACHE_MISS);
    }

    #[test]
    fn replay_on_missing_file_is_a_no_op() {
        let cache = LruCache::new(4).unwrap();
        replay(Path::new("/nonexistent/path.log"), &cache).unwrap();
        assert_eq!(cache.count(), 0);
    }
}
