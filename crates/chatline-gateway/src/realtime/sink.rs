//! Seam to the persistence collaborator.

use async_trait::async_trait;

use chatline_core::error::Result;
use chatline_core::message::{ChatMessage, RouteOutcome};

/// Receives every routed message, delivered or queued.
///
/// Durable history is the implementor's job; the router does not retry or
/// buffer, and a failing sink never changes a route outcome.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn record(&self, msg: &ChatMessage, outcome: RouteOutcome) -> Result<()>;
}

/// Default sink: logs the hand-off and stores nothing.
#[derive(Debug, Default)]
pub struct TracingSink;

#[async_trait]
impl MessageSink for TracingSink {
    async fn record(&self, msg: &ChatMessage, outcome: RouteOutcome) -> Result<()> {
        tracing::debug!(
            from = %msg.from,
            to = %msg.to,
            outcome = outcome.as_str(),
            has_attachment = msg.attachment.is_some(),
            "message handed to persistence"
        );
        Ok(())
    }
}
