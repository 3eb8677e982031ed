//! Unified error type for the Nightfall server.

use nightfall_protocol::ProtocolError;
use nightfall_room::RoomError;
use nightfall_session::SessionError;
use nightfall_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attributes let `?` lift layer errors into this type.
#[derive(Debug, thiserror::Error)]
pub enum NightfallError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (bad token, expired seat).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (unknown room, game refusal).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// The environment held an unusable setting.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
