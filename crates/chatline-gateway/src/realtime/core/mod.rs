//! Presence and routing core.
//!
//! Connection registry, presence broadcaster, session binder, and message
//! router, all sharing one injected registry.

mod binder;
mod presence;
mod realtime;
mod registry;
mod routing;

pub use binder::{BoundSession, Credentials, SessionBinder, UnbindGuard, UnbindOutcome};
pub use presence::{AnnounceReport, PresenceBroadcaster};
pub use realtime::{RealtimeCore, RealtimeSettings};
pub use registry::ConnectionRegistry;
pub use routing::MessageRouter;
