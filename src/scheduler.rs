//! Generic interval-driven background task with cooperative cancellation.
//!
//! Every background task in this engine (AOF flusher, TTL crawler,
//! snapshotter, metrics emitter, system-metrics sampler) is one of these: a
//! `(interval, stop-signal)` pair waiting on a tick or a cancellation,
//! whichever comes first. None of them busy-wait.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors surfaced by scheduler setup.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The configured interval was zero, which would tick continuously.
    #[error("scheduler interval must be greater than zero")]
    ZeroInterval,
}

/// A handle to a running background tick loop.
pub struct Scheduler {
    name: &'static str,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Scheduler {
    /// Start `work` running every `interval`, under the label `name` (used
    /// only for tracing spans).
    pub fn start<F>(
        name: &'static str,
        interval: Duration,
        mut work: F,
    ) -> Result<Self, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval);
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = spawn_ticker(name, interval, stop_rx, move || work());
        Ok(Self {
            name,
            stop_tx,
            handle,
        })
    }

    /// Signal the loop to stop. The in-flight tick, if any, completes first.
    pub async fn stop(self) {
        tracing::debug!(scheduler = self.name, "stopping scheduler");
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

/// Spawn a task that calls `work` on every tick of `interval` until `stop`
/// carries `true`. Factored out of [`Scheduler::start`] so the select loop
/// itself stays test-reachable independent of the handle/stop-sender
/// bookkeeping `Scheduler` wraps around it.
fn spawn_ticker<F>(
    name: &'static str,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
    mut work: F,
) -> JoinHandle<()>
where
    F: FnMut() + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tracing::trace!(scheduler = name, "tick");
                    work();
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        tracing::debug!(scheduler = name, "stop signal received");
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn zero_interval_rejected() {
        let result = Scheduler::start("test", Duration::from_secs(0), || {});
        assert!(matches!(result, Err(SchedulerError::ZeroInterval)));
    }

    #[tokio::test]
    async fn scheduler_ticks_and_stops_cooperatively() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let scheduler = Scheduler::start("test", Duration::from_millis(10), move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(55)).await;
        scheduler.stop().await;

        assert!(counter.load(Ordering::SeqCst) >= 2);
    }
}
