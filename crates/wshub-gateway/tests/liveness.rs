#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep, Duration};

use wshub_core::error::Result;
use wshub_gateway::hub::{ConnectionHub, ConnectionOptions, ConnectionSink, LivenessMonitor, QueueSink};

use common::{attach, connect, RecordingSink};

#[tokio::test]
async fn eviction_threshold_is_strict() {
    let hub = ConnectionHub::default();
    let a = connect(&hub, "a", None);
    hub.subscribe("a", "g").unwrap();

    let hb = hub.get("a").unwrap().last_heartbeat;
    let timeout = Duration::from_secs(60);
    let eps = Duration::from_millis(1);

    assert_eq!(hub.evict_stale(hb + timeout - eps, timeout).await, 0);
    assert!(hub.get("a").is_some());

    assert_eq!(hub.evict_stale(hb + timeout + eps, timeout).await, 1);
    assert!(hub.get("a").is_none());
    assert!(hub.members_of("g").is_empty());
    assert!(a.is_closed());

    let notice = a.of_type("error");
    assert_eq!(notice.len(), 1);
    assert_eq!(notice[0]["error"], "heartbeat timeout");
}

#[tokio::test]
async fn failing_notice_does_not_abort_scan() {
    let hub = ConnectionHub::default();
    attach(&hub, "broken", None, RecordingSink::broken());
    let ok = connect(&hub, "ok", None);

    let timeout = Duration::from_secs(1);
    let later = hub.get("ok").unwrap().last_heartbeat + Duration::from_secs(5);

    assert_eq!(hub.evict_stale(later, timeout).await, 2);
    assert_eq!(hub.connection_count(), 0);
    assert!(ok.is_closed());
    assert_eq!(hub.metrics().evictions.get(&[("reason", "heartbeat_timeout")]), 2);
}

#[tokio::test]
async fn heartbeat_keeps_connection_alive() {
    let hub = ConnectionHub::default();
    connect(&hub, "a", None);
    let before = hub.get("a").unwrap().last_heartbeat;

    sleep(Duration::from_millis(5)).await;
    hub.touch_heartbeat("a");
    let after = hub.get("a").unwrap().last_heartbeat;
    assert!(after > before);

    let timeout = Duration::from_secs(10);
    assert_eq!(hub.evict_stale(before + timeout + Duration::from_millis(1), timeout).await, 0);
}

#[tokio::test]
async fn monitor_evicts_and_stops() {
    let hub = Arc::new(ConnectionHub::default());
    let monitor = LivenessMonitor::new(
        Arc::clone(&hub),
        Duration::from_millis(20),
        Duration::from_millis(50),
        Duration::from_millis(5),
    );

    assert!(monitor.start().await);
    assert!(!monitor.start().await, "second start is a no-op");
    assert!(monitor.is_running().await);

    let a = connect(&hub, "a", None);
    sleep(Duration::from_millis(250)).await;
    assert!(hub.get("a").is_none());
    assert!(a.is_closed());

    monitor.stop().await;
    assert!(!monitor.is_running().await);

    connect(&hub, "b", None);
    sleep(Duration::from_millis(150)).await;
    assert!(hub.get("b").is_some(), "stopped monitor must not scan");

    // Restart after stop works.
    assert!(monitor.start().await);
    monitor.stop().await;
}

#[tokio::test]
async fn full_queues_do_not_slow_the_scan() {
    let hub = ConnectionHub::default();
    let mut receivers = Vec::new();
    for i in 0..5 {
        let (tx, rx) = mpsc::channel::<Message>(1);
        tx.try_send(Message::Text("backlog".into())).unwrap();
        receivers.push(rx);
        let sink = Arc::new(QueueSink::new(tx, Arc::new(Notify::new()), Duration::from_millis(300)));
        hub.register(sink, &format!("slow-{i}"), ConnectionOptions::default()).unwrap();
    }

    let timeout = Duration::from_secs(1);
    let later = tokio::time::Instant::now() + Duration::from_secs(5);
    let started = std::time::Instant::now();

    assert_eq!(hub.evict_stale(later, timeout).await, 5);
    assert!(started.elapsed() < Duration::from_millis(300), "scan waited on a full queue");
    assert_eq!(hub.connection_count(), 0);
}

/// Panics on the first write, then behaves.
#[derive(Default)]
struct PanicOnceSink {
    tripped: AtomicBool,
    closed: AtomicBool,
}

#[async_trait]
impl ConnectionSink for PanicOnceSink {
    async fn send_text(&self, frame: &str) -> Result<()> {
        self.try_send_text(frame)
    }

    fn try_send_text(&self, _frame: &str) -> Result<()> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            panic!("sink exploded");
        }
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn monitor_survives_a_panicking_scan() {
    let hub = Arc::new(ConnectionHub::default());
    let monitor = LivenessMonitor::new(
        Arc::clone(&hub),
        Duration::from_millis(20),
        Duration::from_millis(50),
        Duration::from_millis(5),
    );
    let bomb = Arc::new(PanicOnceSink::default());
    hub.register(bomb.clone(), "bomb", ConnectionOptions::default()).unwrap();

    assert!(monitor.start().await);
    sleep(Duration::from_millis(150)).await;
    assert!(bomb.tripped.load(Ordering::SeqCst), "first scan reached the sink");
    assert!(hub.get("bomb").is_none());
    assert!(monitor.is_running().await, "loop must outlive the panic");

    let next = connect(&hub, "next", None);
    sleep(Duration::from_millis(250)).await;
    assert!(hub.get("next").is_none());
    assert!(next.is_closed());
    assert_eq!(next.of_type("error")[0]["error"], "heartbeat timeout");

    monitor.stop().await;
}

#[tokio::test]
async fn error_backoff_stays_below_interval() {
    let hub = Arc::new(ConnectionHub::default());
    let m = LivenessMonitor::new(
        Arc::clone(&hub),
        Duration::from_secs(2),
        Duration::from_secs(4),
        Duration::from_secs(10),
    );
    assert_eq!(m.error_backoff(), Duration::from_secs(1));

    let m = LivenessMonitor::new(hub, Duration::from_secs(2), Duration::from_secs(4), Duration::from_millis(100));
    assert_eq!(m.error_backoff(), Duration::from_millis(100));
}
