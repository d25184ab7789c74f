//! Transport layer (WebSocket).
//!
//! Exposes the WS upgrade handler and the frame codec that classifies
//! messages before they reach the message router.

pub mod codec;
pub mod ws;
