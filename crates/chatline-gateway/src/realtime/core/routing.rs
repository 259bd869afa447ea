use std::sync::Arc;

use tokio::time::Duration;

use chatline_core::error::{ChatError, Result};
use chatline_core::message::{ChatMessage, RouteOutcome};
use chatline_core::protocol::events;

use crate::obs::GatewayMetrics;
use crate::realtime::core::ConnectionRegistry;
use crate::realtime::sink::MessageSink;

/// Point-to-point delivery through the registry.
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
    sink: Arc<dyn MessageSink>,
    deliver_timeout: Duration,
    metrics: Arc<GatewayMetrics>,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        sink: Arc<dyn MessageSink>,
        deliver_timeout: Duration,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            registry,
            sink,
            deliver_timeout,
            metrics,
        }
    }

    /// Route `msg` from `msg.from` to `msg.to`.
    ///
    /// Only structure is checked: at least one of text or attachment.
    /// Attachment size/type limits are enforced before this call.
    /// Every accepted message reaches the sink, whatever the outcome.
    pub async fn route(&self, msg: ChatMessage) -> Result<RouteOutcome> {
        if !msg.has_content() {
            let err = ChatError::InvalidPayload("message needs text or an attachment".into());
            self.metrics
                .route_rejections
                .inc(&[("code", err.client_code().as_str())]);
            return Err(err);
        }

        let outcome = self.deliver(&msg).await;
        self.metrics.routes.inc(&[("outcome", outcome.as_str())]);

        if let Err(e) = self.sink.record(&msg, outcome).await {
            tracing::warn!(from = %msg.from, to = %msg.to, error = %e, "message sink failed");
        }
        Ok(outcome)
    }

    async fn deliver(&self, msg: &ChatMessage) -> RouteOutcome {
        let Some(conn) = self.registry.get(&msg.to) else {
            return RouteOutcome::Queued;
        };
        if !conn.is_live() {
            return RouteOutcome::Queued;
        }

        match conn
            .send_text(events::new_message_json(msg), self.deliver_timeout)
            .await
        {
            Ok(()) => {
                tracing::debug!(from = %msg.from, to = %msg.to, conn_id = %conn.id(), "message delivered");
                RouteOutcome::Delivered
            }
            Err(e) => {
                tracing::debug!(from = %msg.from, to = %msg.to, conn_id = %conn.id(), error = %e, "direct delivery failed");
                RouteOutcome::Queued
            }
        }
    }
}
