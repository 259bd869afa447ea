//! Top-level facade crate for chatline.
//!
//! Re-exports core types and the gateway library so users can depend on a single crate.

pub mod core {
    pub use chatline_core::*;
}

pub mod gateway {
    pub use chatline_gateway::*;
}
