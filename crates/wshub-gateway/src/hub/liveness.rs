//! Liveness monitor: a periodic background task that evicts connections
//! whose last heartbeat is older than the configured timeout.
//!
//! Cycle: sleep(interval) -> scan -> evict stale -> repeat. `start` is
//! idempotent; `stop` wakes the sleeping task and waits for it to exit.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::GatewaySection;

use super::ConnectionHub;

struct Running {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct LivenessMonitor {
    hub: Arc<ConnectionHub>,
    interval: Duration,
    timeout: Duration,
    error_backoff: Duration,
    task: Mutex<Option<Running>>,
}

impl LivenessMonitor {
    /// `error_backoff` is clamped to at most half the interval.
    pub fn new(hub: Arc<ConnectionHub>, interval: Duration, timeout: Duration, error_backoff: Duration) -> Self {
        Self {
            hub,
            interval,
            timeout,
            error_backoff: error_backoff.min(interval / 2),
            task: Mutex::new(None),
        }
    }

    pub fn from_config(hub: Arc<ConnectionHub>, gw: &GatewaySection) -> Self {
        Self::new(
            hub,
            Duration::from_secs(gw.heartbeat_interval),
            Duration::from_secs(gw.heartbeat_timeout),
            Duration::from_millis(gw.scan_error_backoff_ms),
        )
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sleep used after a scan panics.
    pub fn error_backoff(&self) -> Duration {
        self.error_backoff
    }

    /// Spawn the scan loop. Returns false if it was already running.
    pub async fn start(&self) -> bool {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("liveness monitor already running");
            return false;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.hub),
            self.interval,
            self.timeout,
            self.error_backoff,
            stop_rx,
        ));
        *task = Some(Running { stop_tx, handle });
        true
    }

    /// Signal the loop to exit and wait for it. No-op when not running.
    pub async fn stop(&self) {
        let Some(running) = self.task.lock().await.take() else {
            return;
        };
        let _ = running.stop_tx.send(true);
        if let Err(e) = running.handle.await {
            error!(error = %e, "liveness monitor task ended abnormally");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.task
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }
}

async fn run_loop(
    hub: Arc<ConnectionHub>,
    interval: Duration,
    timeout: Duration,
    error_backoff: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!(interval_ms = interval.as_millis() as u64, timeout_ms = timeout.as_millis() as u64, "liveness monitor started");
    let mut delay = interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = stop_rx.changed() => {
                // Sender dropped: the monitor itself is gone.
                if changed.is_err() {
                    break;
                }
            }
        }
        if *stop_rx.borrow() {
            break;
        }

        let scan = AssertUnwindSafe(hub.evict_stale(Instant::now(), timeout)).catch_unwind();
        match scan.await {
            Ok(evicted) => {
                if evicted > 0 {
                    info!(evicted, remaining = hub.connection_count(), "liveness scan evicted stale connections");
                }
                delay = interval;
            }
            Err(_) => {
                error!(backoff_ms = error_backoff.as_millis() as u64, "liveness scan panicked, backing off");
                delay = error_backoff;
            }
        }
    }

    info!("liveness monitor stopped");
}
