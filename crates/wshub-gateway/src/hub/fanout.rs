use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tracing::{debug, error};

use wshub_core::protocol::OutboundMessage;

use super::{ConnectionHub, ConnectionSink, EvictReason};

/// Delivery capability shared by handlers, periodic jobs and HTTP-triggered
/// broadcasts. Every mode returns the number of successful deliveries;
/// targets whose write fails are evicted and not counted.
#[async_trait]
pub trait Fanout: Send + Sync {
    async fn send_to_one(&self, connection_id: &str, msg: &OutboundMessage) -> bool;

    async fn send_to_user(&self, user_id: &str, msg: &OutboundMessage) -> usize;

    /// `exclude` keeps a join/leave notice from echoing back to its actor.
    async fn send_to_channel(
        &self,
        channel: &str,
        msg: &OutboundMessage,
        exclude: Option<&str>,
    ) -> usize;

    async fn broadcast(&self, msg: &OutboundMessage, exclude: Option<&str>) -> usize;
}

type Target = (String, Arc<dyn ConnectionSink>);

impl ConnectionHub {
    /// Stamp once, serialize once, write to all targets concurrently.
    async fn deliver(&self, mode: &'static str, msg: &OutboundMessage, targets: Vec<Target>) -> usize {
        if targets.is_empty() {
            return 0;
        }
        let frame = match msg.stamp(Utc::now()) {
            Ok(f) => f,
            Err(e) => {
                error!(msg_type = msg.msg_type(), error = %e, "outbound encode failed");
                return 0;
            }
        };

        let mut futs = FuturesUnordered::new();
        for (id, sink) in targets {
            let frame = frame.as_str();
            futs.push(async move {
                let res = sink.send_text(frame).await;
                (id, sink, res)
            });
        }

        let mut delivered = 0usize;
        let mut failed = Vec::new();
        while let Some((id, sink, res)) = futs.next().await {
            match res {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!(connection_id = %id, mode, error = %e, "delivery failed");
                    failed.push((id, sink));
                }
            }
        }
        drop(futs);

        // Keyed by handle: the id may have been re-registered while the write
        // was pending.
        for (id, sink) in failed {
            self.evict(&id, &sink, EvictReason::SendFailed);
        }
        self.metrics
            .fanout_deliveries
            .add(&[("mode", mode)], delivered as u64);
        delivered
    }
}

#[async_trait]
impl Fanout for ConnectionHub {
    async fn send_to_one(&self, connection_id: &str, msg: &OutboundMessage) -> bool {
        let Some(sink) = self.registry.sink(connection_id) else {
            return false;
        };
        self.deliver("one", msg, vec![(connection_id.to_string(), sink)])
            .await
            == 1
    }

    async fn send_to_user(&self, user_id: &str, msg: &OutboundMessage) -> usize {
        let targets = self
            .registry
            .ids_for_user(user_id)
            .into_iter()
            .filter_map(|id| self.registry.sink(&id).map(|s| (id, s)))
            .collect();
        self.deliver("user", msg, targets).await
    }

    async fn send_to_channel(
        &self,
        channel: &str,
        msg: &OutboundMessage,
        exclude: Option<&str>,
    ) -> usize {
        let mut targets = Vec::new();
        for id in self.channels.members_of(channel) {
            if Some(id.as_str()) == exclude {
                continue;
            }
            match self.registry.sink(&id) {
                Some(sink) => targets.push((id, sink)),
                None => {
                    // Member outlived its record; prune it now.
                    self.channels.remove_member(channel, &id);
                }
            }
        }
        self.deliver("channel", msg, targets).await
    }

    async fn broadcast(&self, msg: &OutboundMessage, exclude: Option<&str>) -> usize {
        let targets = self.registry.all_sinks(exclude);
        self.deliver("broadcast", msg, targets).await
    }
}
