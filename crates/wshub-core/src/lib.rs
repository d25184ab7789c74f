//! wshub core: transport-agnostic protocol primitives and the error surface.
//!
//! This crate defines the JSON envelope consumed from clients, the builders
//! for server-originated messages, and the error type shared by the gateway.
//! It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed client
//! input surfaces as `HubError` rather than crashing the process.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

pub use error::{ClientCode, HubError, Result};
