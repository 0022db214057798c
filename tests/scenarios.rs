//! End-to-end scenarios exercised against the public crate API rather than
//! internal module state, complementing the unit tests colocated with each
//! module.

use std::sync::Arc;
use std::time::Duration;

use sentinel_cache::cache::{CACHE_MISS, LruCache, NOT_STORED, STORED};
use sentinel_cache::config::Configuration;
use sentinel_cache::dispatcher::{Command, CommandRequest, Dispatcher};
use sentinel_cache::engine::Engine;
use sentinel_cache::metrics::AppMetrics;
use sentinel_cache::paths::PersistedPaths;

fn dispatcher_over(capacity: usize) -> Dispatcher {
    let cache = Arc::new(LruCache::new(capacity).unwrap());
    let metrics = Arc::new(AppMetrics::default());
    Dispatcher::new(cache, None, metrics)
}

#[test]
fn s1_lru_eviction() {
    let dispatcher = dispatcher_over(2);
    dispatcher.dispatch(put("England", "London", -1));
    dispatcher.dispatch(put("Ireland", "Dublin", -1));
    dispatcher.dispatch(put("America", "Washington", -1));

    assert_eq!(dispatcher.dispatch(get("England")).message, CACHE_MISS);
    assert_eq!(dispatcher.dispatch(get("Ireland")).gobj.value.unwrap(), "Dublin");
    assert_eq!(dispatcher.dispatch(get("America")).gobj.value.unwrap(), "Washington");
}

#[test]
fn s2_touch_on_read() {
    let dispatcher = dispatcher_over(2);
    dispatcher.dispatch(put("England", "London", -1));
    dispatcher.dispatch(put("Ireland", "Dublin", -1));
    dispatcher.dispatch(put("America", "Washington", -1));

    dispatcher.dispatch(get("Ireland"));
    dispatcher.dispatch(put("France", "Paris", -1));

    assert_eq!(dispatcher.dispatch(get("America")).message, CACHE_MISS);
    assert_eq!(dispatcher.dispatch(get("Ireland")).gobj.value.unwrap(), "Dublin");
    assert_eq!(dispatcher.dispatch(get("France")).gobj.value.unwrap(), "Paris");
}

#[test]
fn s3_add_semantics() {
    let dispatcher = dispatcher_over(16);
    assert_eq!(dispatcher.dispatch(add("k", "v1", -1)).message, STORED);
    assert_eq!(dispatcher.dispatch(add("k", "v2", -1)).message, NOT_STORED);
    assert_eq!(dispatcher.dispatch(get("k")).gobj.value.unwrap(), "v1");
}

#[test]
fn s4_ttl_crawler() {
    let cache = LruCache::new(16).unwrap();
    cache.put("England", "London", 5);
    cache.put("Italy", "Rome", -1);
    cache.put("Ireland", "Dublin", 11);

    std::thread::sleep(Duration::from_secs(6));
    sentinel_cache::crawler::sweep_expired(&cache);

    assert_eq!(cache.count(), 2);
    assert_eq!(cache.get("England").message, CACHE_MISS);
    assert_eq!(cache.get("Italy").gobj.value.unwrap(), "Rome");
    assert_eq!(cache.get("Ireland").gobj.value.unwrap(), "Dublin");
}

#[tokio::test]
async fn s5_aof_compaction_and_restart() {
    let dir = tempfile::tempdir().unwrap();
    let paths = PersistedPaths::resolve_under(dir.path()).unwrap();
    let config = Configuration {
        keyspace_size: 16,
        crawler_interval: 3600,
        snapshot_interval: 3600,
        snapshot_enabled: false,
        persistence_aof: true,
        aof_max_bytes: 300,
        app_metric_interval: 3600,
        sys_metric_interval: 3600,
        ..Configuration::default()
    };

    {
        let engine = Engine::boot(config.clone(), paths.clone()).await.unwrap();
        engine.handle(add_request("Key1", "Initial", -1));
        engine.handle(add_request("Key2", "Initial", -1));
        for i in 0..100 {
            engine.handle(put_request("Key1", &format!("NewValue{i}"), -1));
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        // Let the 1s flusher tick at least once before shutdown.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        engine.shutdown().await;
    }

    let rebooted = Engine::boot(config, paths).await.unwrap();
    let response = rebooted.handle(get_request("Key1"));
    assert!(response.gobj.value.unwrap().starts_with("NewValue"));
    rebooted.shutdown().await;
}

#[test]
fn s6_snapshot_restore() {
    let cache = LruCache::new(65536).unwrap();
    cache.put("Italy", "Rome", -1);
    cache.put("England", "London", 2);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.gz");
    sentinel_cache::snapshot::create(&cache, &path, true, "SUPPLY_PASSPHRASE").unwrap();

    let restored = sentinel_cache::snapshot::restore(&path, true, "SUPPLY_PASSPHRASE").unwrap();
    assert_eq!(restored.get("England").gobj.value.unwrap(), "London");
    assert_eq!(restored.count(), 2);
    assert_eq!(restored.capacity(), 65536);
}

fn put(key: &str, value: &str, ttl: i64) -> Command {
    Command::Put {
        key: key.to_string(),
        value: value.to_string(),
        ttl,
    }
}

fn add(key: &str, value: &str, ttl: i64) -> Command {
    Command::Add {
        key: key.to_string(),
        value: value.to_string(),
        ttl,
    }
}

fn get(key: &str) -> Command {
    Command::Get { key: key.to_string() }
}

fn put_request(key: &str, value: &str, ttl: i64) -> CommandRequest {
    CommandRequest {
        verb: "put".to_string(),
        key: Some(key.to_string()),
        value: Some(value.to_string()),
        ttl: Some(ttl),
    }
}

fn add_request(key: &str, value: &str, ttl: i64) -> CommandRequest {
    CommandRequest {
        verb: "add".to_string(),
        key: Some(key.to_string()),
        value: Some(value.to_string()),
        ttl: Some(ttl),
    }
}

fn get_request(key: &str) -> CommandRequest {
    CommandRequest {
        verb: "get".to_string(),
        key: Some(key.to_string()),
        value: None,
        ttl: None,
    }
}
