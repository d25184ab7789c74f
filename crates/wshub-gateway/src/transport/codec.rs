//! Frame classification for the transport layer.
//!
//! - Text frames go to the message router as-is (decoded there)
//! - Binary frames are not part of the protocol and are rejected
//! - Ping/Pong/Close are surfaced for lifecycle management

use axum::extract::ws::Message;

#[derive(Debug)]
pub enum Inbound {
    Text(String),
    Binary(usize),
    Ping,
    Pong,
    Close,
}

/// Payload size, computed before any decoding.
pub fn frame_len(msg: &Message) -> usize {
    match msg {
        Message::Text(s) => s.len(),
        Message::Binary(b) => b.len(),
        Message::Ping(v) => v.len(),
        Message::Pong(v) => v.len(),
        Message::Close(_) => 0,
    }
}

pub fn classify(msg: Message) -> Inbound {
    match msg {
        Message::Text(s) => Inbound::Text(s),
        Message::Binary(b) => Inbound::Binary(b.len()),
        Message::Ping(_) => Inbound::Ping,
        Message::Pong(_) => Inbound::Pong,
        Message::Close(_) => Inbound::Close,
    }
}
