use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::time::Duration;

use chatline_core::protocol::events;

use crate::obs::GatewayMetrics;
use crate::realtime::core::ConnectionRegistry;

/// Counts from one announce fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnounceReport {
    pub online: usize,
    pub sent: usize,
    pub failed: usize,
}

/// Sends the full online set to every attached connection.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
    metrics: Arc<GatewayMetrics>,
}

impl PresenceBroadcaster {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        send_timeout: Duration,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            registry,
            send_timeout,
            metrics,
        }
    }

    /// Snapshot the registry and push `getOnlineUsers` to every peer.
    ///
    /// Sends run concurrently, each bounded by `send_timeout`; a closed or
    /// stalled peer only costs its own slot.
    pub async fn announce(&self) -> AnnounceReport {
        let online = self.registry.snapshot_keys();
        let frame = events::online_users_json(&online);
        let peers = self.registry.peers();

        let mut futs = FuturesUnordered::new();
        for conn in peers {
            let frame = frame.clone();
            let limit = self.send_timeout;
            futs.push(async move {
                let res = conn.send_text(frame, limit).await;
                (conn.id(), res)
            });
        }

        let mut report = AnnounceReport {
            online: online.len(),
            ..AnnounceReport::default()
        };
        while let Some((conn_id, res)) = futs.next().await {
            match res {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    self.metrics.presence_send_failures.inc(&[]);
                    tracing::debug!(%conn_id, error = %e, "presence send failed");
                }
            }
        }

        self.metrics.presence_broadcasts.inc(&[]);
        tracing::debug!(online = report.online, sent = report.sent, failed = report.failed, "presence announced");
        report
    }
}
