//! chatline gateway library entry.
//!
//! Wires the transport, HTTP API, and the presence/routing core into one
//! service. Consumed by the binary (`main.rs`) and by integration tests.

pub mod api;
pub mod app_state;
pub mod config;
pub mod obs;
pub mod ops;
pub mod realtime;
pub mod router;
pub mod transport;
