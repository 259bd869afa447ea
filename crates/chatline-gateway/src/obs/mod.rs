//! Lightweight in-process metrics (dependency-free).
//!
//! Counters and gauges are atomics keyed by label sets and rendered as
//! Prometheus text by the `/metrics` handler.

pub mod metrics;

pub use metrics::GatewayMetrics;
