//! Inbound envelope (JSON text frame).
//!
//! Clients send `{"type": ..., "payload" | "data": {...}, ...}`. The raw value
//! is kept alongside the typed header so error replies can echo it back.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{HubError, Result};

/// Typed view of the envelope header. Unknown fields are tolerated.
#[derive(Debug, Default, Deserialize)]
struct Header {
    #[serde(rename = "type", default)]
    msg_type: Option<String>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    room_id: Option<String>,
    #[serde(default)]
    agent_id: Option<String>,
}

/// Decoded inbound message.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Handler selector (`type` in JSON).
    pub msg_type: String,
    /// `payload`, falling back to `data`; `Null` when neither is present.
    pub payload: Value,
    /// Client-supplied timestamp. Informational only.
    pub timestamp: Option<Value>,
    pub message_id: Option<String>,
    pub user_id: Option<String>,
    /// `channel`, falling back to `room_id`.
    pub channel: Option<String>,
    pub agent_id: Option<String>,
    /// The full message as received.
    pub raw: Value,
}

/// Parse a text frame into a JSON value.
pub fn parse_frame(text: &str) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| HubError::InvalidJson(e.to_string()))
}

impl Envelope {
    /// Decode a text frame in one step.
    pub fn decode(text: &str) -> Result<Self> {
        Self::from_value(parse_frame(text)?)
    }

    /// Build an envelope from an already-parsed JSON value.
    pub fn from_value(raw: Value) -> Result<Self> {
        if !raw.is_object() {
            return Err(HubError::BadRequest("message must be a JSON object".into()));
        }
        let h = Header::deserialize(&raw)
            .map_err(|e| HubError::BadRequest(format!("malformed envelope: {e}")))?;

        let msg_type = h
            .msg_type
            .filter(|t| !t.is_empty())
            .ok_or_else(|| HubError::BadRequest("missing message type".into()))?;

        Ok(Self {
            msg_type,
            payload: h.payload.or(h.data).unwrap_or(Value::Null),
            timestamp: h.timestamp,
            message_id: h.message_id,
            user_id: h.user_id,
            channel: h.channel.or(h.room_id),
            agent_id: h.agent_id,
            raw,
        })
    }

    /// Channel/room targeted by this message: top-level `channel`/`room_id`
    /// first, then the same keys inside the payload.
    pub fn channel_name(&self) -> Option<&str> {
        if let Some(c) = self.channel.as_deref() {
            return Some(c);
        }
        ["channel", "room_id"]
            .iter()
            .find_map(|k| self.payload.get(*k).and_then(Value::as_str))
    }

    /// Timestamp the client attached, top-level or inside the payload.
    pub fn client_timestamp(&self) -> Option<&Value> {
        self.timestamp
            .as_ref()
            .or_else(|| self.payload.get("timestamp"))
            .filter(|v| !v.is_null())
    }
}
