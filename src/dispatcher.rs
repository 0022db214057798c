//! The command dispatcher: wire verb → tagged enum → cache operation, with
//! AOF logging and metrics recording layered on afterward for writes.
//!
//! Dispatch is a tagged enum matched exhaustively (`Get`, `Put`, `Add`,
//! `Delete`, `Flush`, `NodeSize`, `AppMetrics`, `SysMetrics`, `Ping`) rather
//! than a name→handler table, so adding or removing a verb is a compile
//! error at every call site that isn't updated to match.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::aof::AofWriter;
use crate::cache::{CacheObject, CacheResponse, LruCache, PONG};
use crate::metrics::AppMetrics;

/// A parsed, dispatchable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `GET(key)`.
    Get { key: String },
    /// `PUT(key, value, ttl)`.
    Put { key: String, value: String, ttl: i64 },
    /// `ADD(key, value, ttl)`.
    Add { key: String, value: String, ttl: i64 },
    /// `DELETE(key)`.
    Delete { key: String },
    /// `FLUSH`.
    Flush,
    /// `NODE_SIZE`.
    NodeSize,
    /// `getAppMetrics`.
    AppMetrics,
    /// `getSysMetrics`.
    SysMetrics,
    /// `ping`.
    Ping,
}

impl Command {
    /// Whether this command mutates cache state and therefore needs AOF
    /// logging and routing through the write executor.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Command::Put { .. } | Command::Add { .. } | Command::Delete { .. } | Command::Flush
        )
    }

    /// The verb string this command is logged/metered under.
    fn verb(&self) -> &'static str {
        match self {
            Command::Get { .. } => "get",
            Command::Put { .. } => "put",
            Command::Add { .. } => "add",
            Command::Delete { .. } => "delete",
            Command::Flush => "flush",
            Command::NodeSize => "nodeSize",
            Command::AppMetrics => "getAppMetrics",
            Command::SysMetrics => "getSysMetrics",
            Command::Ping => "ping",
        }
    }

    /// Parse a wire-level request into a command, or the original verb
    /// string on an unrecognized command.
    pub fn parse(request: &CommandRequest) -> Result<Command, String> {
        let cmd = match request.verb.as_str() {
            "get" => Command::Get {
                key: request.key.clone().unwrap_or_default(),
            },
            "put" => Command::Put {
                key: request.key.clone().unwrap_or_default(),
                value: request.value.clone().unwrap_or_default(),
                ttl: request.ttl.unwrap_or(-1),
            },
            "add" => Command::Add {
                key: request.key.clone().unwrap_or_default(),
                value: request.value.clone().unwrap_or_default(),
                ttl: request.ttl.unwrap_or(-1),
            },
            "delete" => Command::Delete {
                key: request.key.clone().unwrap_or_default(),
            },
            "flush" => Command::Flush,
            "nodeSize" => Command::NodeSize,
            "getAppMetrics" => Command::AppMetrics,
            "getSysMetrics" => Command::SysMetrics,
            "ping" => Command::Ping,
            other => return Err(other.to_string()),
        };
        Ok(cmd)
    }
}

/// The transport-agnostic wire request shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub verb: String,
    pub key: Option<String>,
    pub value: Option<String>,
    pub ttl: Option<i64>,
}

/// The seam a replicated consensus log would hook into. `Local` (the only
/// implementation shipped here) executes immediately; a `Replicated`
/// implementation would serialize `{cmd, args}`, submit it to the log, and
/// only invoke `cache` from inside the log's deterministic apply callback.
/// Building an actual consensus protocol (leader election, log replication,
/// membership changes) is out of scope for a single-node engine — this
/// trait only reserves the seam a future multi-node mode would plug into.
pub trait WriteExecutor: Send + Sync {
    /// Execute `cmd` against `cache`, returning its response.
    fn execute(&self, cmd: &Command, cache: &LruCache) -> CacheResponse;
}

/// Executes writes directly against the local cache.
pub struct LocalExecutor;

impl WriteExecutor for LocalExecutor {
    fn execute(&self, cmd: &Command, cache: &LruCache) -> CacheResponse {
        apply(cmd, cache)
    }
}

fn apply(cmd: &Command, cache: &LruCache) -> CacheResponse {
    match cmd {
        Command::Get { key } => cache.get(key),
        Command::Put { key, value, ttl } => cache.put(key, value, *ttl),
        Command::Add { key, value, ttl } => cache.add(key, value, *ttl),
        Command::Delete { key } => cache.delete(key),
        Command::Flush => cache.flush(),
        Command::NodeSize => cache.node_size(),
        Command::AppMetrics | Command::SysMetrics | Command::Ping => {
            unreachable!("handled directly by Dispatcher::dispatch")
        }
    }
}

/// Owns the cache, the (optional) AOF writer, and the metrics aggregator,
/// and routes every parsed command to the right place.
pub struct Dispatcher {
    cache: Arc<LruCache>,
    aof: Option<Arc<AofWriter>>,
    metrics: Arc<AppMetrics>,
    executor: Arc<dyn WriteExecutor>,
}

impl Dispatcher {
    /// Construct a dispatcher executing writes locally.
    pub fn new(cache: Arc<LruCache>, aof: Option<Arc<AofWriter>>, metrics: Arc<AppMetrics>) -> Self {
        Self::with_executor(cache, aof, metrics, Arc::new(LocalExecutor))
    }

    /// Construct a dispatcher routing writes through a custom executor (the
    /// consensus extension point).
    pub fn with_executor(
        cache: Arc<LruCache>,
        aof: Option<Arc<AofWriter>>,
        metrics: Arc<AppMetrics>,
        executor: Arc<dyn WriteExecutor>,
    ) -> Self {
        Self {
            cache,
            aof,
            metrics,
            executor,
        }
    }

    /// Dispatch one parsed command, applying AOF logging and metrics
    /// recording for writes. Reads never touch the AOF buffer and never
    /// traverse a consensus log.
    pub fn dispatch(&self, cmd: Command) -> CacheResponse {
        let response = match &cmd {
            Command::Ping => CacheResponse {
                gobj: CacheObject::default(),
                status: 1,
                message: PONG.to_string(),
                error: String::new(),
            },
            Command::AppMetrics | Command::SysMetrics => {
                // Metric reads are served by the transport layer directly
                // from the metrics logs (see `crate::http`); the dispatcher
                // only needs to report success here.
                CacheResponse {
                    gobj: CacheObject::default(),
                    status: 1,
                    message: crate::cache::OK.to_string(),
                    error: String::new(),
                }
            }
            _ if cmd.is_write() => self.executor.execute(&cmd, &self.cache),
            _ => apply(&cmd, &self.cache),
        };

        if cmd.is_write() {
            self.record_write(&cmd, &response);
        }
        self.metrics.record(cmd.verb(), &response);
        response
    }

    fn record_write(&self, cmd: &Command, response: &CacheResponse) {
        let Some(aof) = &self.aof else { return };
        if !response.is_write_success() {
            return;
        }
        match cmd {
            Command::Put { key, value, ttl } => aof.record_write("put", key, value, *ttl),
            Command::Add { key, value, ttl } => aof.record_write("add", key, value, *ttl),
            Command::Delete { key } => aof.record_write("delete", key, "NA", -1),
            Command::Flush => aof.record_flush(),
            _ => {}
        }
    }

    /// Build the response for an unrecognized command name.
    pub fn bad_command(verb: &str) -> CacheResponse {
        CacheResponse::bad_command(verb)
    }
}
