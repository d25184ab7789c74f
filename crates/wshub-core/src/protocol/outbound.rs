//! Server-originated messages.
//!
//! Every message gets a `message_id` when it is built. The `timestamp` is left
//! to [`OutboundMessage::stamp`], which the fan-out calls once per delivery so
//! clients can order messages relative to server processing.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::error::{HubError, Result};

/// Format used for every server timestamp (RFC 3339, millis, `Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A JSON object envelope ready to be stamped and sent.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    fields: Map<String, Value>,
}

impl OutboundMessage {
    /// New message of the given type with a fresh `message_id`.
    pub fn new(msg_type: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("type".into(), Value::String(msg_type.to_string()));
        fields.insert("message_id".into(), Value::String(Uuid::new_v4().to_string()));
        Self { fields }
    }

    /// Wrap a caller-built JSON object. It must carry a string `type`; a
    /// `message_id` is assigned when missing.
    pub fn from_value(v: Value) -> Result<Self> {
        let Value::Object(mut fields) = v else {
            return Err(HubError::BadRequest("outbound message must be a JSON object".into()));
        };
        if !fields.get("type").is_some_and(Value::is_string) {
            return Err(HubError::BadRequest("outbound message requires a string type".into()));
        }
        fields
            .entry("message_id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        Ok(Self { fields })
    }

    /// Set (or replace) a top-level field.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Set the `data` field.
    pub fn with_data(self, data: Value) -> Self {
        self.with("data", data)
    }

    pub fn msg_type(&self) -> &str {
        self.fields.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.fields.get("message_id").and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Serialize with `timestamp` set to `at`, overriding any caller value.
    pub fn stamp(&self, at: DateTime<Utc>) -> Result<String> {
        let mut fields = self.fields.clone();
        fields.insert("timestamp".into(), Value::String(format_timestamp(at)));
        serde_json::to_string(&fields)
            .map_err(|e| HubError::Internal(format!("json encode failed: {e}")))
    }
}

// --------------------
// Builders for the server message shapes
// --------------------

/// Sent right after accept.
pub fn welcome(connection_id: &str, heartbeat_interval_secs: u64) -> OutboundMessage {
    OutboundMessage::new("welcome").with_data(json!({
        "connection_id": connection_id,
        "heartbeat_interval": heartbeat_interval_secs,
    }))
}

/// Reply to `heartbeat` (`heartbeat_response`) or `ping` (`pong`).
pub fn heartbeat_ack(
    reply_type: &str,
    server_time: DateTime<Utc>,
    client_timestamp: Option<&Value>,
) -> OutboundMessage {
    OutboundMessage::new(reply_type).with_data(json!({
        "server_time": format_timestamp(server_time),
        "client_timestamp": client_timestamp.cloned().unwrap_or(Value::Null),
    }))
}

/// `subscription_confirmed` / `unsubscription_confirmed`.
pub fn subscription_result(reply_type: &str, channel: &str, success: bool) -> OutboundMessage {
    OutboundMessage::new(reply_type)
        .with("channel", channel)
        .with_data(json!({ "channel": channel, "success": success }))
}

/// Error envelope. `original` is echoed back under `payload` when present.
pub fn error(code: &str, message: &str, original: Option<&Value>) -> OutboundMessage {
    let out = OutboundMessage::new("error")
        .with("error", message)
        .with("code", code);
    match original {
        Some(v) => out.with("payload", v.clone()),
        None => out,
    }
}

/// Membership change notification for the other members of a room.
pub fn room_update(
    action: &str,
    room_id: &str,
    user_id: Option<&str>,
    member_count: usize,
) -> OutboundMessage {
    OutboundMessage::new("room_update")
        .with("room_id", room_id)
        .with_data(json!({
            "action": action,
            "room_id": room_id,
            "user_id": user_id,
            "member_count": member_count,
        }))
}
