//! Decode-once codec for inbound text frames.
//!
//! Envelope first, then the `data` for the named event. Failures keep the
//! frame's `seq` (when it got that far) so the error reply can echo it.

use chatline_core::error::{ChatError, Result};
use chatline_core::protocol::envelope::Envelope;
use chatline_core::protocol::events::{self, PrivateMessage};

#[derive(Debug)]
pub enum InboundEvent {
    PrivateMessage(PrivateMessage),
    Ping,
}

#[derive(Debug)]
pub struct Inbound {
    pub seq: Option<u64>,
    pub event: InboundEvent,
}

/// A frame that could not be decoded.
#[derive(Debug)]
pub struct Rejected {
    pub seq: Option<u64>,
    pub err: ChatError,
}

pub fn decode_text(s: &str) -> std::result::Result<Inbound, Rejected> {
    let env = Envelope::parse(s).map_err(|err| Rejected { seq: None, err })?;
    let seq = env.seq;
    decode_event(&env)
        .map(|event| Inbound { seq, event })
        .map_err(|err| Rejected { seq, err })
}

fn decode_event(env: &Envelope) -> Result<InboundEvent> {
    match env.event.as_str() {
        events::PRIVATE_MESSAGE => Ok(InboundEvent::PrivateMessage(env.data_as()?)),
        events::PING => Ok(InboundEvent::Ping),
        other => Err(ChatError::BadRequest(format!("unknown event: {other}"))),
    }
}
