//! Shared error type across chatline crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Invalid input / malformed frame.
    BadRequest,
    /// Handshake carried no identity.
    Unauthenticated,
    /// Message has neither text nor attachment.
    InvalidPayload,
    /// Frame or attachment above the configured limit.
    PayloadTooLarge,
    /// Attachment MIME type not in the allow-list.
    UnsupportedMedia,
    /// Unsupported protocol version.
    UnsupportedVersion,
    /// Send to a connection handle failed.
    TransportFailure,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unauthenticated => "UNAUTHENTICATED",
            ClientCode::InvalidPayload => "INVALID_PAYLOAD",
            ClientCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ClientCode::UnsupportedMedia => "UNSUPPORTED_MEDIA",
            ClientCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ClientCode::TransportFailure => "TRANSPORT_FAILURE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, ChatError>;

/// Unified error type used by core and gateway.
///
/// Stale unbinds and offline recipients are outcomes, not errors, and have
/// no variant here.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("transport failure: {0}")]
    TransportFailure(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl ChatError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            ChatError::BadRequest(_) => ClientCode::BadRequest,
            ChatError::Unauthenticated => ClientCode::Unauthenticated,
            ChatError::InvalidPayload(_) => ClientCode::InvalidPayload,
            ChatError::PayloadTooLarge => ClientCode::PayloadTooLarge,
            ChatError::UnsupportedMedia(_) => ClientCode::UnsupportedMedia,
            ChatError::UnsupportedVersion => ClientCode::UnsupportedVersion,
            ChatError::TransportFailure(_) => ClientCode::TransportFailure,
            ChatError::Internal(_) => ClientCode::Internal,
        }
    }
}
