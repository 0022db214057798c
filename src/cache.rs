//! The capacity-bounded LRU cache and its public operations.
//!
//! A single coarse [`parking_lot::Mutex`] guards the index and the recency
//! list together for the duration of each logical operation — GET's
//! lookup-then-touch, PUT's presence-check-then-overwrite-or-evict, and so
//! on each take the lock exactly once, avoiding the over-locking pattern
//! where the same mutex gets acquired and released repeatedly within one
//! logical operation.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::{now_unix, Node};
use crate::list::RecencyList;

/// Response message emitted on a successful GET/NODE_SIZE/ping/metrics read.
pub const OK: &str = "OK";
/// Response message for a GET that found nothing (not an error).
pub const CACHE_MISS: &str = "CACHE_MISS";
/// Response message for a successful PUT or ADD.
pub const STORED: &str = "STORED";
/// Response message for an ADD against an already-present key.
pub const NOT_STORED: &str = "NOT_STORED";
/// Response message for a successful DELETE.
pub const REMOVED: &str = "REMOVED";
/// Response message for a DELETE against an absent key.
pub const NOT_FOUND: &str = "NOT_FOUND";
/// Response message for a successful FLUSH.
pub const FLUSH: &str = "FLUSH";
/// Response message for a FLUSH that did not empty the cache.
pub const ERR_FLUSH: &str = "ERR_FLUSH";
/// Response message for PING.
pub const PONG: &str = "Pong!";
/// Error code for an unrecognized command.
pub const INVALID_COMMAND_ERR: &str = "INVALID_COMMAND_ERR";

/// Errors surfaced by cache construction (never by its operations — those
/// always return a [`CacheResponse`], even on a negative outcome).
#[derive(Error, Debug)]
pub enum CacheError {
    /// `capacity` must be a positive number of entries.
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
}

/// The key/value/ttl view of an entry carried in a [`CacheResponse`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheObject {
    /// The key the request or response concerns, if any.
    pub key: Option<String>,
    /// The value, present on a successful GET or on a write echoing its input.
    pub value: Option<String>,
    /// The TTL, present alongside `value` where relevant.
    pub ttl: Option<i64>,
}

/// The uniform response envelope every cache operation returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheResponse {
    /// Key/value/ttl payload, when the operation has one to report.
    pub gobj: CacheObject,
    /// `1` on success, `0` on a negative-but-not-erroneous outcome.
    pub status: i32,
    /// Human-readable outcome, one of the constants in this module.
    pub message: String,
    /// Machine-readable error code, empty string when there is none.
    pub error: String,
}

impl CacheResponse {
    fn ok(gobj: CacheObject, message: &str) -> Self {
        Self {
            gobj,
            status: 1,
            message: message.to_string(),
            error: String::new(),
        }
    }

    fn negative(gobj: CacheObject, message: &str) -> Self {
        Self {
            gobj,
            status: 0,
            message: message.to_string(),
            error: String::new(),
        }
    }

    /// Build the response for an unrecognized command name.
    pub fn bad_command(cmd: &str) -> Self {
        Self {
            gobj: CacheObject::default(),
            status: 0,
            message: format!("Command '{cmd}' is not a recognized command"),
            error: INVALID_COMMAND_ERR.to_string(),
        }
    }

    /// Whether this response represents a write that should be AOF-logged.
    pub fn is_write_success(&self) -> bool {
        self.status == 1
            && matches!(self.message.as_str(), STORED | REMOVED | FLUSH)
    }
}

struct Inner {
    index: HashMap<String, usize>,
    list: RecencyList,
    count: usize,
    full: bool,
}

/// A capacity-bounded, LRU-evicting, TTL-tagged key/value cache.
pub struct LruCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl LruCache {
    /// Construct an empty cache bounded to `capacity` entries.
    pub fn new(capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                index: HashMap::new(),
                list: RecencyList::new(),
                count: 0,
                full: false,
            }),
        })
    }

    /// Construct a cache from a pre-populated set of nodes, used by snapshot
    /// restore and AOF replay. Insertion order determines initial recency
    /// order (last inserted becomes MRU).
    pub fn from_nodes(capacity: usize, nodes: Vec<Node>) -> Result<Self, CacheError> {
        let cache = Self::new(capacity)?;
        {
            let mut guard = cache.inner.lock();
            for node in nodes {
                let key = node.key.clone();
                let idx = guard.list.insert(node);
                guard.index.insert(key, idx);
                guard.count += 1;
            }
            guard.full = guard.count == cache.capacity;
        }
        Ok(cache)
    }

    /// Maximum number of entries this cache will hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `GET(key)`: touches the entry to MRU on a hit, never checks TTL.
    pub fn get(&self, key: &str) -> CacheResponse {
        let mut guard = self.inner.lock();
        let Some(&idx) = guard.index.get(key) else {
            return CacheResponse::negative(CacheObject::default(), CACHE_MISS);
        };
        guard.list.move_to_front(idx);
        let node = guard
            .list
            .get(idx)
            .expect("index entry pointed at an unlinked node");
        CacheResponse::ok(
            CacheObject {
                key: Some(node.key.clone()),
                value: Some(node.value.clone()),
                ttl: Some(node.ttl),
            },
            OK,
        )
    }

    /// `PUT(key, value, ttl)`: always a write; overwrite-in-place never
    /// refreshes recency or `created_at`.
    pub fn put(&self, key: &str, value: &str, ttl: i64) -> CacheResponse {
        let mut guard = self.inner.lock();
        self.store(&mut guard, key, value, ttl, /* add_only = */ false)
    }

    /// `ADD(key, value, ttl)`: `NOT_STORED` if the key already exists.
    pub fn add(&self, key: &str, value: &str, ttl: i64) -> CacheResponse {
        let mut guard = self.inner.lock();
        self.store(&mut guard, key, value, ttl, /* add_only = */ true)
    }

    fn store(
        &self,
        guard: &mut Inner,
        key: &str,
        value: &str,
        ttl: i64,
        add_only: bool,
    ) -> CacheResponse {
        if let Some(&idx) = guard.index.get(key) {
            if add_only {
                return CacheResponse::negative(CacheObject::default(), NOT_STORED);
            }
            let node = guard
                .list
                .get_mut(idx)
                .expect("index entry pointed at an unlinked node");
            node.value = value.to_string();
            node.ttl = ttl;
            return CacheResponse::ok(
                CacheObject {
                    key: Some(key.to_string()),
                    value: Some(value.to_string()),
                    ttl: Some(ttl),
                },
                STORED,
            );
        }

        if guard.count == self.capacity {
            let evicted = guard
                .list
                .remove_lru()
                .expect("cache reported full but its list was empty");
            guard.index.remove(&evicted.key);
            guard.count -= 1;
        }

        let idx = guard.list.insert(Node::new(key, value, ttl));
        guard.index.insert(key.to_string(), idx);
        guard.count += 1;
        guard.full = guard.count == self.capacity;

        CacheResponse::ok(
            CacheObject {
                key: Some(key.to_string()),
                value: Some(value.to_string()),
                ttl: Some(ttl),
            },
            STORED,
        )
    }

    /// `DELETE(key)`.
    pub fn delete(&self, key: &str) -> CacheResponse {
        let mut guard = self.inner.lock();
        let Some(idx) = guard.index.remove(key) else {
            return CacheResponse::negative(CacheObject::default(), NOT_FOUND);
        };
        guard
            .list
            .remove(idx)
            .expect("index held a key whose node was already unlinked");
        guard.count -= 1;
        guard.full = false;
        CacheResponse::ok(
            CacheObject {
                key: Some(key.to_string()),
                value: None,
                ttl: None,
            },
            REMOVED,
        )
    }

    /// `FLUSH`: evict everything. `full` is cleared at the start of the loop
    /// so an early-terminating implementation can never observe it stuck
    /// `true`.
    pub fn flush(&self) -> CacheResponse {
        let mut guard = self.inner.lock();
        guard.full = false;
        while let Ok(node) = guard.list.remove_lru() {
            guard.index.remove(&node.key);
            guard.count -= 1;
        }
        if guard.count == 0 {
            CacheResponse::ok(CacheObject::default(), FLUSH)
        } else {
            CacheResponse::negative(CacheObject::default(), ERR_FLUSH)
        }
    }

    /// `NODE_SIZE`: current entry count.
    pub fn node_size(&self) -> CacheResponse {
        let guard = self.inner.lock();
        CacheResponse::ok(
            CacheObject {
                key: None,
                value: None,
                ttl: Some(guard.count as i64),
            },
            OK,
        )
    }

    /// Delete `key` without surfacing a response, used by the TTL crawler's
    /// sweep phase; functionally identical to `delete` otherwise.
    pub fn delete_silently(&self, key: &str) {
        let _ = self.delete(key);
    }

    /// Current entry count.
    pub fn count(&self) -> usize {
        self.inner.lock().count
    }

    /// Whether the cache is at capacity.
    pub fn is_full(&self) -> bool {
        self.inner.lock().full
    }

    /// Find entries whose TTL has elapsed as of `now`, walking LRU-to-MRU.
    /// Used by [`crate::crawler`]'s mark phase.
    pub fn expired_keys(&self, now: i64) -> Vec<String> {
        let guard = self.inner.lock();
        guard
            .list
            .iter_lru_to_mru()
            .filter(|(_, node)| node.is_expired_at(now))
            .map(|(_, node)| node.key.clone())
            .collect()
    }

    /// Snapshot the live entries for persistence, excluding list pointers.
    /// Order is index-iteration order, which is unspecified — matching the
    /// restore path's documented "ordering is not preserved" behavior.
    pub fn snapshot_entries(&self) -> Vec<Node> {
        let guard = self.inner.lock();
        guard
            .index
            .values()
            .filter_map(|&idx| guard.list.get(idx).cloned())
            .collect()
    }

    /// Now, as seconds since epoch. Exposed so the crawler and dispatcher
    /// share one clock source.
    pub fn now() -> i64 {
        now_unix()
    }
}
