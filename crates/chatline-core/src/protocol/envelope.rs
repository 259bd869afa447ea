//! Event envelope (JSON text frame).
//!
//! `data` is stored as `RawValue` so only the handler for the event parses it.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{ChatError, Result};
use crate::protocol::PROTOCOL_VERSION;

/// Inbound envelope.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Protocol version.
    pub v: u8,
    /// Event name (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub event: String,
    /// Optional client sequence number, echoed in replies.
    #[serde(default)]
    pub seq: Option<u64>,
    /// Optional payload, stored as raw JSON (lazy parsing).
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl Envelope {
    /// Parse a text frame and check its version.
    pub fn parse(s: &str) -> Result<Self> {
        let env: Envelope = serde_json::from_str(s)
            .map_err(|e| ChatError::BadRequest(format!("invalid envelope json: {e}")))?;
        if env.v != PROTOCOL_VERSION {
            return Err(ChatError::UnsupportedVersion);
        }
        Ok(env)
    }

    /// Deserialize `data` into the payload type for this event.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T> {
        let raw = self
            .data
            .as_ref()
            .ok_or_else(|| ChatError::BadRequest(format!("{} requires data", self.event)))?;
        serde_json::from_str(raw.get())
            .map_err(|e| ChatError::BadRequest(format!("{} invalid data: {e}", self.event)))
    }
}
