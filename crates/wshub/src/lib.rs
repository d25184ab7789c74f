//! Top-level facade crate for wshub.
//!
//! Re-exports the protocol/error types and the gateway library so users can
//! depend on a single crate.

pub mod core {
    pub use wshub_core::*;
}

pub mod gateway {
    pub use wshub_gateway::*;
}
