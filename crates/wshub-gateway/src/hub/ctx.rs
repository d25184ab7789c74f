use std::sync::Arc;

use wshub_core::protocol::OutboundMessage;

use super::{ConnectionHub, Fanout};

/// Per-message context passed to handlers (borrow the hub instead of owning
/// connection state).
#[derive(Clone)]
pub struct HubCtx {
    connection_id: Arc<str>,
    user_id: Option<Arc<str>>,
    hub: Arc<ConnectionHub>,
}

impl HubCtx {
    /// Context for `connection_id`, resolving its user from the registry.
    pub fn new(connection_id: &str, hub: Arc<ConnectionHub>) -> Self {
        let user_id = hub
            .get(connection_id)
            .and_then(|c| c.user_id)
            .map(Arc::<str>::from);
        Self {
            connection_id: Arc::from(connection_id),
            user_id,
            hub,
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn hub(&self) -> &ConnectionHub {
        &self.hub
    }

    pub fn hub_arc(&self) -> Arc<ConnectionHub> {
        Arc::clone(&self.hub)
    }

    /// Send to the connection this message came from.
    pub async fn reply(&self, msg: &OutboundMessage) -> bool {
        self.hub.send_to_one(&self.connection_id, msg).await
    }

    pub async fn publish_channel(&self, channel: &str, msg: &OutboundMessage, include_self: bool) -> usize {
        let exclude = (!include_self).then_some(self.connection_id());
        self.hub.send_to_channel(channel, msg, exclude).await
    }
}
