//! Periodic TTL mark-and-sweep.
//!
//! Expiry is never checked on GET — only the crawler removes expired
//! entries, walking the recency list from LRU toward MRU (an arbitrary
//! direction choice; it costs the same either way) and deleting whatever it
//! finds stale. A key that was deleted or refreshed between mark and sweep
//! is tolerated: the delete path treats it as `NOT_FOUND` and moves on.

use crate::cache::LruCache;

/// Run one mark-and-sweep pass over `cache`.
///
/// Never fails back to a caller: a crawler bug must not be able to corrupt
/// the cache, so this function has no error return at all. The engine wires
/// this into a [`crate::scheduler::Scheduler`] on `crawler_interval`.
pub fn sweep_expired(cache: &LruCache) {
    let now = LruCache::now();
    let expired = cache.expired_keys(now);
    for key in expired {
        cache.delete_silently(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn sweep_removes_only_expired_entries_s4() {
        let cache = LruCache::new(16).unwrap();
        cache.put("England", "London", 1);
        cache.put("Italy", "Rome", -1);
        cache.put("Ireland", "Dublin", 100);

        thread::sleep(Duration::from_secs(2));
        sweep_expired(&cache);

        assert_eq!(cache.count(), 2);
        assert_eq!(cache.get("England").message, crate::cache::CACHE_MISS);
        assert_eq!(cache.get("Italy").gobj.value.unwrap(), "Rome");
        assert_eq!(cache.get("Ireland").gobj.value.unwrap(), "Dublin");
    }

    #[test]
    fn sweep_is_a_no_op_on_an_empty_cache() {
        let cache = LruCache::new(4).unwrap();
        sweep_expired(&cache);
        assert_eq!(cache.count(), 0);
    }
}
