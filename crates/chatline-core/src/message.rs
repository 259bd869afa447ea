//! Direct-message model and routing outcomes.

use serde::{Deserialize, Serialize};

use crate::attachment::Attachment;
use crate::error::{ChatError, Result};

/// Opaque user identity, supplied by the auth collaborator.
pub type UserId = String;

/// A point-to-point message in flight through the router.
///
/// Transient: durable storage belongs to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub from: UserId,
    pub to: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

impl ChatMessage {
    pub fn new(
        from: impl Into<UserId>,
        to: impl Into<UserId>,
        text: Option<String>,
        attachment: Option<Attachment>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            text,
            attachment,
        }
    }

    /// Whether the message carries non-blank text.
    pub fn has_text(&self) -> bool {
        self.text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// A blank recipient can never be registered; reject it before routing.
    pub fn check_recipient(&self) -> Result<()> {
        if self.to.trim().is_empty() {
            return Err(ChatError::BadRequest("recipient must not be empty".into()));
        }
        Ok(())
    }

    /// At least one of text or attachment must be present.
    pub fn has_content(&self) -> bool {
        self.has_text() || self.attachment.is_some()
    }
}

/// Result of routing one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteOutcome {
    /// Handed to the recipient's live connection.
    Delivered,
    /// Recipient offline; left to the persistence collaborator.
    Queued,
}

impl RouteOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteOutcome::Delivered => "delivered",
            RouteOutcome::Queued => "queued",
        }
    }
}
