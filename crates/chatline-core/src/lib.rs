//! chatline core: transport-agnostic wire types, message model, and errors.
//!
//! This crate defines the event envelope, the direct-message model, the
//! attachment boundary policy, and the error surface shared by the gateway
//! and its tests. It carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed frames
//! and bad descriptors surface as `ChatError` so a hostile client cannot take
//! the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod attachment;
pub mod error;
pub mod message;
pub mod protocol;

/// Shared result type.
pub use error::{ChatError, Result};
