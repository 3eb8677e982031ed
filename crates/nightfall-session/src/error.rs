//! Error types for the session layer.

use crate::SessionKey;

/// Errors that can occur during session management.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session exists for the given seat.
    #[error("session not found for {0}")]
    NotFound(SessionKey),

    /// The reconnection token was never issued, or has been revoked.
    #[error("invalid reconnection token")]
    InvalidToken,

    /// The reconnection grace period elapsed before the client came back.
    #[error("session expired for {0}")]
    SessionExpired(SessionKey),
}

impl SessionError {
    /// Wire error code for this failure.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) | Self::InvalidToken => 401,
            Self::SessionExpired(_) => 410,
        }
    }
}
