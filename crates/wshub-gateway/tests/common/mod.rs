//! Test doubles shared by the hub integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use wshub_core::error::{HubError, Result};
use wshub_core::protocol::Envelope;
use wshub_gateway::dispatch::MessageHandler;
use wshub_gateway::hub::{ConnectionHub, ConnectionOptions, ConnectionSink, HubCtx};

/// Sink that records every frame, or fails every write when `broken`.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<String>>,
    broken: AtomicBool,
    closed: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn broken() -> Arc<Self> {
        let s = Self::default();
        s.broken.store(true, Ordering::SeqCst);
        Arc::new(s)
    }

    pub fn frames(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }

    pub fn of_type(&self, msg_type: &str) -> Vec<Value> {
        self.frames()
            .into_iter()
            .filter(|v| v["type"] == msg_type)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionSink for RecordingSink {
    async fn send_text(&self, frame: &str) -> Result<()> {
        self.try_send_text(frame)
    }

    fn try_send_text(&self, frame: &str) -> Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(HubError::Transport("broken pipe".into()));
        }
        self.frames.lock().unwrap().push(frame.to_string());
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Register `id` with a fresh recording sink.
pub fn connect(hub: &ConnectionHub, id: &str, user: Option<&str>) -> Arc<RecordingSink> {
    let sink = RecordingSink::new();
    attach(hub, id, user, sink.clone());
    sink
}

pub fn attach(hub: &ConnectionHub, id: &str, user: Option<&str>, sink: Arc<RecordingSink>) {
    let opts = match user {
        Some(u) => ConnectionOptions::for_user(u),
        None => ConnectionOptions::default(),
    };
    hub.register(sink, id, opts).expect("register");
}

/// Handler that only counts invocations.
#[derive(Default)]
pub struct CountingHandler {
    pub calls: AtomicUsize,
}

impl CountingHandler {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageHandler for CountingHandler {
    async fn handle(&self, _ctx: HubCtx, _env: Envelope) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
