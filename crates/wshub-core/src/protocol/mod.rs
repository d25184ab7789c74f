//! Wire protocol: tagged JSON envelopes over WebSocket text frames.
//!
//! - Inbound: client frames decoded into [`inbound::Envelope`].
//! - Outbound: server-originated messages built with [`outbound::OutboundMessage`]
//!   and stamped with a server timestamp at send time.
//!
//! Decoding is panic-free: malformed input is reported as `HubError`.

pub mod inbound;
pub mod outbound;

pub use inbound::{parse_frame, Envelope};
pub use outbound::OutboundMessage;
