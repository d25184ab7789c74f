//! Message routing: tagged JSON dispatch and the built-in handlers.
//!
//! Re-exports the router and handler trait so downstream consumers can
//! depend on this module directly.

pub mod builtin;
pub mod message_router;

pub use message_router::{MessageHandler, MessageRouter, RouteOutcome};
