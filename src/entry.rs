//! The node record held by the cache.

use serde::{Deserialize, Serialize};

/// Sentinel TTL value meaning "never expires".
pub const NO_EXPIRY: i64 = -1;

/// A single cache entry.
///
/// A `Node` is either unlinked (not part of any cache) or linked exactly once
/// in the recency list and present in the index under `key`. The link
/// pointers themselves live in [`crate::list::RecencyList`]'s arena, not on
/// this struct, so a `Node` can be serialized (for snapshots) without
/// carrying runtime-only pointer state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Non-empty key, unique within the cache.
    pub key: String,
    /// Opaque payload.
    pub value: String,
    /// Seconds; `-1` means the entry never expires.
    pub ttl: i64,
    /// Seconds since epoch, set on insert and never refreshed by PUT.
    pub created_at: i64,
}

impl Node {
    /// Construct a new node stamped with the current wall-clock time.
    pub fn new(key: impl Into<String>, value: impl Into<String>, ttl: i64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
            created_at: now_unix(),
        }
    }

    /// Construct a node with an explicit `created_at`, used by snapshot
    /// restore and AOF replay where the timestamp source differs from "now".
    pub fn with_created_at(
        key: impl Into<String>,
        value: impl Into<String>,
        ttl: i64,
        created_at: i64,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ttl,
            created_at,
        }
    }

    /// Whether this entry's TTL has elapsed as of `now`.
    ///
    /// A `ttl` of `-1` never expires. This is only ever consulted by the
    /// crawler (see [`crate::crawler`]) — GET deliberately does not check it.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.ttl != NO_EXPIRY && self.created_at + self.ttl < now
    }
}

/// Seconds since the Unix epoch, saturating to zero on a pre-epoch clock.
pub fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
