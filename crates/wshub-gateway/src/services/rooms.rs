use async_trait::async_trait;
use serde_json::{json, Value};

use wshub_core::error::{HubError, Result};
use wshub_core::protocol::{outbound, Envelope, OutboundMessage};

use crate::dispatch::builtin::require_channel;
use crate::dispatch::MessageHandler;
use crate::hub::HubCtx;

/// `join_room`: subscribe, confirm to the actor, tell everyone else.
pub struct JoinRoomService;

#[async_trait]
impl MessageHandler for JoinRoomService {
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let room = require_channel(&env)?;
        ctx.hub().subscribe(ctx.connection_id(), room)?;
        let members = ctx.hub().member_count(room);

        let joined = OutboundMessage::new("room_joined")
            .with("room_id", room)
            .with_data(json!({ "room_id": room, "member_count": members }));
        ctx.reply(&joined).await;

        let update = outbound::room_update("user_joined", room, ctx.user_id(), members);
        ctx.publish_channel(room, &update, false).await;
        Ok(())
    }
}

/// `leave_room`: unsubscribe, confirm, tell the remaining members.
pub struct LeaveRoomService;

#[async_trait]
impl MessageHandler for LeaveRoomService {
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let room = require_channel(&env)?;
        let was_member = ctx.hub().is_member(room, ctx.connection_id());
        ctx.hub().unsubscribe(ctx.connection_id(), room)?;
        let members = ctx.hub().member_count(room);

        let left = OutboundMessage::new("room_left")
            .with("room_id", room)
            .with_data(json!({ "room_id": room, "member_count": members }));
        ctx.reply(&left).await;

        if was_member {
            let update = outbound::room_update("user_left", room, ctx.user_id(), members);
            ctx.publish_channel(room, &update, false).await;
        }
        Ok(())
    }
}

/// `room_message`: relay the payload to the other members of a room the
/// sender belongs to.
pub struct RoomMessageService;

#[async_trait]
impl MessageHandler for RoomMessageService {
    async fn handle(&self, ctx: HubCtx, env: Envelope) -> Result<()> {
        let room = require_channel(&env)?;
        if !ctx.hub().is_member(room, ctx.connection_id()) {
            return Err(HubError::BadRequest(format!("not a member of room {room}")));
        }

        let mut out = OutboundMessage::new("room_message")
            .with("room_id", room)
            .with("user_id", ctx.user_id().map(str::to_string))
            .with("connection_id", ctx.connection_id())
            .with_data(env.payload.clone());
        if let Some(agent) = env.agent_id.as_deref() {
            out = out.with("agent_id", agent);
        }
        if out.get("data").is_some_and(Value::is_null) {
            out = out.with_data(json!({}));
        }
        ctx.publish_channel(room, &out, false).await;
        Ok(())
    }
}
