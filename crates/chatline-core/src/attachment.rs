//! Attachment descriptors and the boundary policy applied before routing.
//!
//! The router never holds attachment bytes. Clients upload to the storage
//! collaborator first and send a descriptor (URL plus metadata); this module
//! checks that descriptor against a size cap and a MIME allow-list.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};

/// Default upper bound on attachment size: 50 MiB.
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Images, videos, and common document types.
pub const DEFAULT_ALLOWED_MIME: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/quicktime",
    "video/webm",
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
];

/// Opaque reference to an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Attachment {
    /// Where the storage collaborator serves the blob.
    pub url: String,
    /// Declared MIME type.
    pub mime: String,
    /// Size in bytes.
    pub size: u64,
    /// Original file name, if the client supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Attachment {
    /// Coarse media category (`image`, `video`, `document`).
    pub fn kind(&self) -> &'static str {
        let essence = mime_essence(&self.mime);
        if essence.starts_with("image/") {
            "image"
        } else if essence.starts_with("video/") {
            "video"
        } else {
            "document"
        }
    }
}

/// Size and type constraints enforced at the gateway boundary.
#[derive(Debug, Clone)]
pub struct AttachmentPolicy {
    max_bytes: u64,
    allowed_mime: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTACHMENT_BYTES,
            DEFAULT_ALLOWED_MIME.iter().map(|m| m.to_string()),
        )
    }
}

impl AttachmentPolicy {
    pub fn new(max_bytes: u64, allowed_mime: impl IntoIterator<Item = String>) -> Self {
        Self {
            max_bytes,
            allowed_mime: allowed_mime
                .into_iter()
                .map(|m| m.trim().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn check(&self, att: &Attachment) -> Result<()> {
        if att.url.trim().is_empty() {
            return Err(ChatError::BadRequest("attachment url must not be empty".into()));
        }
        if att.size > self.max_bytes {
            return Err(ChatError::PayloadTooLarge);
        }
        let essence = mime_essence(&att.mime);
        if !self.allowed_mime.iter().any(|m| *m == essence) {
            return Err(ChatError::UnsupportedMedia(att.mime.clone()));
        }
        Ok(())
    }

    /// Check an optional attachment; `None` always passes.
    pub fn check_opt(&self, att: Option<&Attachment>) -> Result<()> {
        att.map_or(Ok(()), |a| self.check(a))
    }
}

/// `Text/Plain; charset=utf-8` -> `text/plain`.
fn mime_essence(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
