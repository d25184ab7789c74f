//! Transport handles as seen by the hub.
//!
//! The hub never owns a socket. It holds an `Arc<dyn ConnectionSink>` shared
//! with the transport task that does own it.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, Notify};
use tokio::time::Duration;

use wshub_core::error::{HubError, Result};

/// Write side of one connection.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    /// Deliver one text frame. Any error is terminal for the connection.
    async fn send_text(&self, frame: &str) -> Result<()>;

    /// Enqueue without waiting. Fails if the transport cannot take the frame
    /// right now.
    fn try_send_text(&self, frame: &str) -> Result<()>;

    /// Ask the transport to end the session. Best-effort, never blocks.
    fn close(&self);
}

/// Sink backed by the session's bounded outbound queue.
#[derive(Clone)]
pub struct QueueSink {
    tx: mpsc::Sender<Message>,
    shutdown: Arc<Notify>,
    write_timeout: Duration,
}

impl QueueSink {
    pub fn new(tx: mpsc::Sender<Message>, shutdown: Arc<Notify>, write_timeout: Duration) -> Self {
        Self {
            tx,
            shutdown,
            write_timeout,
        }
    }
}

#[async_trait]
impl ConnectionSink for QueueSink {
    async fn send_text(&self, frame: &str) -> Result<()> {
        self.tx
            .send_timeout(Message::Text(frame.to_owned()), self.write_timeout)
            .await
            .map_err(|e| HubError::Transport(format!("outbound queue: {e}")))
    }

    fn try_send_text(&self, frame: &str) -> Result<()> {
        self.tx
            .try_send(Message::Text(frame.to_owned()))
            .map_err(|e| HubError::Transport(format!("outbound queue: {e}")))
    }

    fn close(&self) {
        // notify_one stores a permit if the session is not waiting yet.
        self.shutdown.notify_one();
    }
}
