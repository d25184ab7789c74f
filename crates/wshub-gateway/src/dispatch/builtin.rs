//! Built-in handlers: liveness and channel subscription.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use wshub_core::error::{HubError, Result};
use wshub_core::protocol::{outbound, Envelope};

use crate::dispatch::{MessageHandler, MessageRouter};
use crate::hub::HubCtx;

pub fn register(router: &mut MessageRouter) {
    router.register_handler("heartbeat", Arc::new(HeartbeatHandler::new("heartbeat_response")));
    router.register_handler("ping", Arc::new(HeartbeatHandler::new("pong")));
    router.register_handler("subscribe", Arc::new(SubscribeHandler));
    router.register_handler("unsubscribe", Arc::new(UnsubscribeHandler));
}

/// Channel name from the envelope, or a bad request naming the message type.
pub(crate) fn require_channel<'a>(env: &'a Envelope) -> Result<&'a str> {
    env.channel_name()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| HubError::BadRequest(format!("{} requires a channel", env.msg_type)))
}

/// Refreshes liveness and answers with server time plus the echoed client
/// timestamp, so clients can measure round trips.
pub struct HeartbeatHandler {
    reply_type: &'static str,
}

impl HeartbeatHandler {
    pub fn new(reply_type: &'static str) -> Self {
        Self { reply_type }
    }
}

#[async_trait]
impl MessageHandler for HeartbeatHandler {
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        ctx.hub().touch_heartbeat(ctx.connection_id());
        let ack = outbound::heartbeat_ack(self.reply_type, Utc::now(), env.client_timestamp());
        ctx.reply(&ack).await;
        Ok(())
    }
}

pub struct SubscribeHandler;

#[async_trait]
impl MessageHandler for SubscribeHandler {
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let channel = require_channel(&env)?;
        let success = match ctx.hub().subscribe(ctx.connection_id(), channel) {
            Ok(()) => true,
            Err(e) => {
                debug!(connection_id = ctx.connection_id(), channel, error = %e, "subscribe failed");
                false
            }
        };
        ctx.reply(&outbound::subscription_result("subscription_confirmed", channel, success))
            .await;
        Ok(())
    }
}

pub struct UnsubscribeHandler;

#[async_trait]
impl MessageHandler for UnsubscribeHandler {
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let channel = require_channel(&env)?;
        let success = ctx.hub().unsubscribe(ctx.connection_id(), channel).is_ok();
        ctx.reply(&outbound::subscription_result("unsubscription_confirmed", channel, success))
            .await;
        Ok(())
    }
}
