//! wshub gateway library entry.
//!
//! Wires the transport, message router, connection hub and built-in services
//! into a gateway stack. Consumed by the binary (`main.rs`) and by
//! integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod hub;
pub mod obs;
pub mod ops;
pub mod router;
pub mod services;
pub mod transport;
