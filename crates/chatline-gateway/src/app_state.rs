//! Shared application state for the chatline gateway.
//!
//! Owns the realtime core (registry, binder, broadcaster, router), the
//! attachment policy, and metrics. Cloned into every handler.

use std::sync::Arc;

use chatline_core::attachment::AttachmentPolicy;
use chatline_core::error::Result;

use crate::config::GatewayConfig;
use crate::obs::GatewayMetrics;
use crate::realtime::{MessageSink, RealtimeCore, TracingSink};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    realtime: Arc<RealtimeCore>,
    metrics: Arc<GatewayMetrics>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    attachments: AttachmentPolicy,
}

impl AppState {
    /// Build application state with the logging-only message sink.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        Self::with_sink(cfg, Arc::new(TracingSink))
    }

    /// Build application state around a persistence collaborator.
    pub fn with_sink(cfg: GatewayConfig, sink: Arc<dyn MessageSink>) -> Result<Self> {
        cfg.validate()?;

        let metrics = Arc::new(GatewayMetrics::default());
        let realtime = Arc::new(RealtimeCore::new(
            cfg.realtime_settings(),
            sink,
            Arc::clone(&metrics),
        ));
        let attachments = cfg.attachments.policy();

        Ok(Self {
            inner: Arc::new(AppStateInner { cfg, attachments }),
            realtime,
            metrics,
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn attachments(&self) -> &AttachmentPolicy {
        &self.inner.attachments
    }

    pub fn realtime(&self) -> Arc<RealtimeCore> {
        Arc::clone(&self.realtime)
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    pub fn set_draining(&self) {
        self.metrics.set_draining();
    }

    pub fn is_draining(&self) -> bool {
        self.metrics.is_draining()
    }

    /// Registry-derived gauges appended to `/metrics`.
    pub fn metrics_extra(&self) -> Vec<(&'static str, u64)> {
        let registry = &self.realtime.registry;
        vec![
            ("chatline_online_users", registry.online_count() as u64),
            ("chatline_peers", registry.peer_count() as u64),
        ]
    }
}
