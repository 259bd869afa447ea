use std::fmt;

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use chatline_core::error::{ChatError, Result};

/// Process-unique connection id, allocated by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Addressable handle to one live client connection.
///
/// The transport task owns the socket; the core only holds the sending half
/// of that task's outbound queue. Two handles are equal iff their ids are.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnId,
    tx: mpsc::Sender<Message>,
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl Connection {
    pub fn new(id: ConnId, tx: mpsc::Sender<Message>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// False once the transport task has dropped its receiver.
    pub fn is_live(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a text frame, waiting at most `limit` for queue space.
    pub async fn send_text(&self, text: String, limit: Duration) -> Result<()> {
        match timeout(limit, self.tx.send(Message::Text(text))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ChatError::TransportFailure(format!(
                "connection {} closed",
                self.id
            ))),
            Err(_) => Err(ChatError::TransportFailure(format!(
                "send to connection {} timed out",
                self.id
            ))),
        }
    }
}
