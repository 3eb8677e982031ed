//! Error types for the room layer.

use nightfall_engine::GameError;
use nightfall_protocol::{RoomCode, Seat};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room is registered under this code.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// A host asked for a code that is already in use.
    #[error("room code {0} is already taken")]
    CodeTaken(RoomCode),

    /// The seat a token names no longer exists in the room.
    #[error("seat {1} no longer exists in room {0}")]
    SeatGone(RoomCode, Seat),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),

    /// The game refused the request.
    #[error(transparent)]
    Game(#[from] GameError),
}

impl RoomError {
    /// The wire error code sent to the client.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::CodeTaken(_) => 409,
            Self::SeatGone(..) | Self::Unavailable(_) => 410,
            Self::Game(e) => e.code(),
        }
    }
}
