use async_trait::async_trait;
use serde_json::json;

use wshub_core::error::Result;
use wshub_core::protocol::{Envelope, OutboundMessage};

use crate::dispatch::MessageHandler;
use crate::hub::HubCtx;

/// `get_stats`: hub-wide counts plus the caller's own subscriptions.
pub struct StatsService;

#[async_trait]
impl MessageHandler for StatsService {
    async fn handle(&self, ctx: HubCtx, _env: Envelope) -> Result<()> {
        let hub = ctx.hub();
        let mine: Vec<String> = hub
            .get(ctx.connection_id())
            .map(|c| c.subscribed_channels.into_iter().collect())
            .unwrap_or_default();

        let stats = OutboundMessage::new("stats").with_data(json!({
            "connection_count": hub.connection_count(),
            "channel_count": hub.channel_count(),
            "subscribed_channels": mine,
        }));
        ctx.reply(&stats).await;
        Ok(())
    }
}
