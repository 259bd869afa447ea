use std::sync::Arc;

use tokio::time::Duration;

use crate::obs::GatewayMetrics;
use crate::realtime::core::{ConnectionRegistry, MessageRouter, PresenceBroadcaster, SessionBinder};
use crate::realtime::sink::MessageSink;

/// Timeouts for the send paths of the realtime core.
#[derive(Debug, Clone, Copy)]
pub struct RealtimeSettings {
    /// Per-peer bound on one presence send.
    pub presence_send_timeout: Duration,
    /// Bound on one direct-message send.
    pub deliver_timeout: Duration,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            presence_send_timeout: Duration::from_millis(1500),
            deliver_timeout: Duration::from_millis(1500),
        }
    }
}

/// RealtimeCore: one registry shared by the binder, broadcaster, and router.
///
/// Owned by the application state; its lifetime is the server's.
pub struct RealtimeCore {
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: PresenceBroadcaster,
    pub binder: SessionBinder,
    pub router: MessageRouter,
}

impl RealtimeCore {
    pub fn new(
        settings: RealtimeSettings,
        sink: Arc<dyn MessageSink>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = PresenceBroadcaster::new(
            Arc::clone(&registry),
            settings.presence_send_timeout,
            Arc::clone(&metrics),
        );
        let binder = SessionBinder::new(
            Arc::clone(&registry),
            broadcaster.clone(),
            Arc::clone(&metrics),
        );
        let router = MessageRouter::new(
            Arc::clone(&registry),
            sink,
            settings.deliver_timeout,
            metrics,
        );
        Self {
            registry,
            broadcaster,
            binder,
            router,
        }
    }
}
