//! Errors surfaced by the call engine.

use crate::transport::TransportError;

/// Every way a call can fail.
///
/// The protocol variants mirror the status classes: 401 is
/// [`ClientError::AuthorizationRequired`], 403 is [`ClientError::Forbidden`],
/// 412 is [`ClientError::InvalidParams`], and anything else (including a 200
/// with an empty body) is [`ClientError::UnexpectedStatus`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("authorization required")]
    AuthorizationRequired,

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("invalid parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("unexpected HTTP status {status}: {reason}")]
    UnexpectedStatus { status: u16, reason: String },

    /// Another call on the same engine is still outstanding.
    #[error("another request is already in flight")]
    ConcurrentRequest,

    /// `cancel_current_request` was called with nothing in flight.
    #[error("no request is in flight")]
    NoActiveRequest,

    #[error("request cancelled")]
    RequestCancelled,

    /// The session expired and logging in again did not work. Terminal.
    #[error("re-authentication failed: {reason}")]
    ReAuthentication { reason: String },

    #[error("invalid login credentials")]
    InvalidLoginCredentials,

    #[error("invalid URL {0}")]
    InvalidUrl(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
