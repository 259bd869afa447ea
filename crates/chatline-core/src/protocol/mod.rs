//! Wire protocol: JSON event envelopes over WebSocket text frames.
//!
//! - `envelope`: the inbound frame shape, with lazily parsed `data`.
//! - `events`: event names, inbound payloads, and outbound frame builders.
//!
//! Parsers are panic-free; malformed input is reported as `ChatError`.

pub mod envelope;
pub mod events;

/// Current protocol version carried in every frame.
pub const PROTOCOL_VERSION: u8 = 1;
