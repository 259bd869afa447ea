//! Event names, inbound payloads, and outbound frame builders.

use serde::Deserialize;
use serde_json::json;

use crate::attachment::Attachment;
use crate::error::ClientCode;
use crate::message::{ChatMessage, RouteOutcome, UserId};
use crate::protocol::PROTOCOL_VERSION;

/// Client -> server: direct message.
pub const PRIVATE_MESSAGE: &str = "private_message";
/// Client -> server: application keepalive.
pub const PING: &str = "ping";

/// Server -> client: handshake result.
pub const SESSION: &str = "session";
/// Server -> all clients: full online set.
pub const ONLINE_USERS: &str = "getOnlineUsers";
/// Server -> recipient: delivered message.
pub const NEW_MESSAGE: &str = "new_message";
/// Server -> sender: route outcome for a `private_message`.
pub const MESSAGE_STATUS: &str = "message_status";
/// Server -> client: keepalive reply.
pub const PONG: &str = "pong";
/// Server -> client: rejected frame.
pub const ERROR: &str = "error";

/// `private_message` data.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrivateMessage {
    pub to: UserId,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

impl PrivateMessage {
    pub fn into_message(self, from: impl Into<UserId>) -> ChatMessage {
        ChatMessage::new(from, self.to, self.text, self.attachment)
    }
}

pub fn session_json(user: Option<&str>, conn_id: u64) -> String {
    json!({
        "v": PROTOCOL_VERSION,
        "type": SESSION,
        "data": { "user": user, "conn": conn_id }
    })
    .to_string()
}

pub fn online_users_json(users: &[UserId]) -> String {
    json!({
        "v": PROTOCOL_VERSION,
        "type": ONLINE_USERS,
        "data": users
    })
    .to_string()
}

pub fn new_message_json(msg: &ChatMessage) -> String {
    json!({
        "v": PROTOCOL_VERSION,
        "type": NEW_MESSAGE,
        "data": msg
    })
    .to_string()
}

pub fn message_status_json(seq: Option<u64>, to: &str, outcome: RouteOutcome) -> String {
    json!({
        "v": PROTOCOL_VERSION,
        "type": MESSAGE_STATUS,
        "seq": seq,
        "data": { "to": to, "outcome": outcome.as_str() }
    })
    .to_string()
}

pub fn pong_json(seq: Option<u64>) -> String {
    json!({
        "v": PROTOCOL_VERSION,
        "type": PONG,
        "seq": seq
    })
    .to_string()
}

pub fn error_json(seq: Option<u64>, code: ClientCode, msg: &str) -> String {
    json!({
        "v": PROTOCOL_VERSION,
        "type": ERROR,
        "seq": seq,
        "data": { "code": code.as_str(), "msg": msg }
    })
    .to_string()
}
