//! Outbound message builder tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use wshub_core::protocol::outbound::{self, OutboundMessage};

#[test]
fn stamp_overrides_caller_timestamp() {
    let msg = OutboundMessage::from_value(json!({
        "type": "chat",
        "timestamp": "client-made-this-up",
        "data": {"text": "hi"}
    }))
    .unwrap();

    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let v: Value = serde_json::from_str(&msg.stamp(at).unwrap()).unwrap();

    assert_eq!(v["timestamp"], "2024-05-01T12:00:00.000Z");
    assert_eq!(v["data"]["text"], "hi");
    assert!(v["message_id"].as_str().is_some_and(|s| !s.is_empty()));
}

#[test]
fn from_value_requires_type() {
    let err = OutboundMessage::from_value(json!({"data": {}})).unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");

    let err = OutboundMessage::from_value(json!("chat")).unwrap_err();
    assert_eq!(err.client_code().as_str(), "BAD_REQUEST");
}

#[test]
fn message_ids_are_unique() {
    let a = OutboundMessage::new("x");
    let b = OutboundMessage::new("x");
    assert_ne!(a.message_id(), b.message_id());
}

#[test]
fn error_echoes_original_payload() {
    let original = json!({"type": "bogus", "payload": {"x": 1}});
    let msg = outbound::error("UNKNOWN_TYPE", "Unknown message type: bogus", Some(&original));
    assert_eq!(msg.msg_type(), "error");
    assert_eq!(msg.get("payload"), Some(&original));
    assert_eq!(msg.get("error").and_then(Value::as_str), Some("Unknown message type: bogus"));
}

#[test]
fn room_update_shape() {
    let msg = outbound::room_update("user_joined", "room1", Some("alice"), 2);
    let data = msg.get("data").unwrap();
    assert_eq!(data["action"], "user_joined");
    assert_eq!(data["room_id"], "room1");
    assert_eq!(data["user_id"], "alice");
    assert_eq!(data["member_count"], 2);
}
