//! Transport layer (WebSocket).
//!
//! The upgrade handler binds each connection to its handshake identity and
//! runs one task per connection; the codec decodes frames once before they
//! reach the router.

pub mod codec;
pub mod ws;

/// Handshake header carrying the caller's identity.
pub const USER_HEADER: &str = "x-user-id";
