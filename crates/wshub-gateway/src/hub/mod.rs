//! Connection hub: registry, channel index, fan-out and liveness.
//!
//! `ConnectionHub` is the single owner of connection and channel state. Every
//! mutation that touches both maps goes through it so the two sides stay
//! consistent. Lock order is registry before channel index, and no map guard
//! is ever held across an await.

mod channels;
mod ctx;
mod fanout;
mod liveness;
mod registry;
mod sink;

use std::sync::Arc;

use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use wshub_core::error::{HubError, Result};
use wshub_core::protocol::outbound;

use crate::obs::HubMetrics;

pub use channels::{ChannelIndex, ChannelInfo};
pub use ctx::HubCtx;
pub use fanout::Fanout;
pub use liveness::LivenessMonitor;
pub use registry::{ConnectionInfo, ConnectionOptions, ConnectionRegistry};
pub use sink::{ConnectionSink, QueueSink};

/// Why a connection was torn down by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    SendFailed,
    HeartbeatTimeout,
    Shutdown,
}

impl EvictReason {
    pub fn as_str(self) -> &'static str {
        match self {
            EvictReason::SendFailed => "send_failed",
            EvictReason::HeartbeatTimeout => "heartbeat_timeout",
            EvictReason::Shutdown => "shutdown",
        }
    }
}

pub struct ConnectionHub {
    registry: ConnectionRegistry,
    channels: ChannelIndex,
    metrics: Arc<HubMetrics>,
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new(Arc::new(HubMetrics::default()))
    }
}

impl ConnectionHub {
    pub fn new(metrics: Arc<HubMetrics>) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            channels: ChannelIndex::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &HubMetrics {
        &self.metrics
    }

    // --------------------
    // Connection registry
    // --------------------

    /// Register a connection. Fails with `DuplicateConnection` if the id is live.
    pub fn register(
        &self,
        sink: Arc<dyn ConnectionSink>,
        connection_id: &str,
        opts: ConnectionOptions,
    ) -> Result<()> {
        let user_id = opts.user_id.clone();
        self.registry.insert(connection_id, sink, opts)?;
        self.metrics.connections_opened.inc(&[]);
        self.metrics.connections_active.inc();
        info!(connection_id, user_id = ?user_id, "connection registered");
        Ok(())
    }

    /// Remove a connection and its channel memberships. Idempotent.
    pub fn unregister(&self, connection_id: &str) -> Option<ConnectionInfo> {
        self.teardown(connection_id).map(|(info, _)| info)
    }

    fn teardown(&self, connection_id: &str) -> Option<(ConnectionInfo, Arc<dyn ConnectionSink>)> {
        let removed = self.registry.remove(connection_id)?;
        Some(self.release(removed))
    }

    fn release(
        &self,
        (info, sink): (ConnectionInfo, Arc<dyn ConnectionSink>),
    ) -> (ConnectionInfo, Arc<dyn ConnectionSink>) {
        self.release_channels(&info);
        self.metrics.connections_active.dec();
        debug!(
            connection_id = %info.connection_id,
            channels = info.subscribed_channels.len(),
            "connection unregistered"
        );
        (info, sink)
    }

    fn release_channels(&self, info: &ConnectionInfo) {
        for channel in &info.subscribed_channels {
            self.channels.remove_member(channel, &info.connection_id);
        }
    }

    /// Refresh liveness. No-op if the connection already went away.
    pub fn touch_heartbeat(&self, connection_id: &str) {
        if !self.registry.touch(connection_id, Instant::now()) {
            debug!(connection_id, "heartbeat for unknown connection ignored");
        }
    }

    pub fn get(&self, connection_id: &str) -> Option<ConnectionInfo> {
        self.registry.get(connection_id)
    }

    pub fn set_metadata(&self, connection_id: &str, key: &str, value: serde_json::Value) -> bool {
        self.registry
            .update(connection_id, |info| {
                info.metadata.insert(key.to_string(), value);
            })
            .is_some()
    }

    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    pub fn connection_ids(&self) -> Vec<String> {
        self.registry.ids()
    }

    // --------------------
    // Channel index
    // --------------------

    /// Subscribe a registered connection. Idempotent.
    pub fn subscribe(&self, connection_id: &str, channel: &str) -> Result<()> {
        // Both links are written under the connection's shard lock, so a
        // concurrent unregister either runs first (and we fail) or sees the
        // channel in the record and unlinks it.
        self.registry
            .update(connection_id, |info| {
                info.subscribed_channels.insert(channel.to_string());
                self.channels.add_member(channel, connection_id);
            })
            .ok_or_else(|| HubError::NotConnected(connection_id.to_string()))?;
        debug!(connection_id, channel, "subscribed");
        Ok(())
    }

    /// Unsubscribe. Idempotent; unknown connections and channels are fine.
    pub fn unsubscribe(&self, connection_id: &str, channel: &str) -> Result<()> {
        let linked = self
            .registry
            .update(connection_id, |info| info.subscribed_channels.remove(channel))
            .unwrap_or(false);
        // Also runs when the record is gone so no stale member survives.
        self.channels.remove_member(channel, connection_id);
        if linked {
            debug!(connection_id, channel, "unsubscribed");
        }
        Ok(())
    }

    pub fn members_of(&self, channel: &str) -> std::collections::HashSet<String> {
        self.channels.members_of(channel)
    }

    pub fn member_count(&self, channel: &str) -> usize {
        self.channels.member_count(channel)
    }

    pub fn is_member(&self, channel: &str, connection_id: &str) -> bool {
        self.channels.is_member(channel, connection_id)
    }

    pub fn create_channel(&self, name: &str, display_name: Option<String>) -> ChannelInfo {
        self.channels.create(name, display_name)
    }

    pub fn channel_info(&self, name: &str) -> Option<ChannelInfo> {
        self.channels.info(name)
    }

    pub fn list_channels(&self) -> Vec<ChannelInfo> {
        self.channels.list()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    // --------------------
    // Eviction
    // --------------------

    /// Full teardown of a connection the hub can no longer use, but only while
    /// `connection_id` is still served by `sink`. Returns false when the id is
    /// gone or now belongs to another connection.
    pub fn evict(&self, connection_id: &str, sink: &Arc<dyn ConnectionSink>, reason: EvictReason) -> bool {
        let Some(removed) = self.registry.remove_if_sink(connection_id, sink) else {
            debug!(connection_id, "handle no longer registered, nothing to evict");
            return false;
        };
        let (info, sink) = self.release(removed);
        sink.close();
        self.metrics.evictions.inc(&[("reason", reason.as_str())]);
        warn!(
            connection_id = %info.connection_id,
            user_id = ?info.user_id,
            reason = reason.as_str(),
            "connection evicted"
        );
        true
    }

    /// Evict every connection whose last heartbeat is older than `timeout`
    /// at `now`. Returns the number evicted.
    pub async fn evict_stale(&self, now: Instant, timeout: Duration) -> usize {
        let notice = match outbound::error("TIMEOUT", "heartbeat timeout", None).stamp(chrono::Utc::now()) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!(error = %e, "timeout notice encode failed");
                None
            }
        };
        let mut evicted = 0;
        for id in self.registry.stale_ids(now, timeout) {
            let Some((info, sink)) = self.registry.remove_if_stale(&id, now, timeout) else {
                continue;
            };
            self.release_channels(&info);
            self.metrics.connections_active.dec();
            self.metrics.evictions.inc(&[("reason", EvictReason::HeartbeatTimeout.as_str())]);
            evicted += 1;

            let idle = now.saturating_duration_since(info.last_heartbeat);
            warn!(connection_id = %id, idle_ms = idle.as_millis() as u64, "heartbeat timeout, evicting");

            // Best-effort notice. Never waits on a full queue: a stale client
            // is usually not reading.
            if let Some(frame) = notice.as_deref() {
                if let Err(e) = sink.try_send_text(frame) {
                    debug!(connection_id = %id, error = %e, "timeout notice not delivered");
                }
            }
            sink.close();
        }
        evicted
    }

    /// Drop all connections and channels, closing every transport.
    pub fn clear(&self) {
        let sinks = self.registry.drain();
        for sink in &sinks {
            sink.close();
        }
        self.channels.clear();
        self.metrics.connections_active.set(0);
        if !sinks.is_empty() {
            self.metrics
                .evictions
                .add(&[("reason", EvictReason::Shutdown.as_str())], sinks.len() as u64);
        }
        info!(closed = sinks.len(), "hub cleared");
    }
}
