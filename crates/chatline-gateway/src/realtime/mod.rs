//! Realtime runtime for the chatline gateway.
//!
//! Registry, presence, binding, and routing, plus the persistence seam.

pub mod core;
pub mod sink;
pub mod types;

pub use self::core::{
    AnnounceReport, BoundSession, ConnectionRegistry, Credentials, MessageRouter,
    PresenceBroadcaster, RealtimeCore, RealtimeSettings, SessionBinder, UnbindGuard,
    UnbindOutcome,
};
pub use sink::{MessageSink, TracingSink};
pub use types::{ConnId, Connection};
