//! Core protocol types for Nightfall's wire format.
//!
//! Everything in here is serialized with serde and sent to browser clients,
//! so the JSON shapes are part of the public contract. The tests at the
//! bottom pin those shapes down.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Protocol version advertised in the handshake. Clients on another
/// version are rejected with code 400.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Persistent identity of a player inside one room.
///
/// Assigned when the join is accepted and never changes afterwards, even
/// when the player reconnects from a different socket. All game state is
/// keyed by this id. Serializes as a plain number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The short shareable code players type to join a room.
///
/// Codes are case-insensitive on input and stored uppercase. Decoding a
/// code from the wire goes through [`RoomCode::parse`], so a malformed code
/// is rejected by the codec before it reaches a handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Longest code accepted from a client.
    pub const MAX_LEN: usize = 8;

    /// Normalizes and validates a room code.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidRoomCode`] if the trimmed input is
    /// empty, longer than [`Self::MAX_LEN`], or not ASCII alphanumeric.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = !code.is_empty()
            && code.len() <= Self::MAX_LEN
            && code.bytes().all(|b| b.is_ascii_alphanumeric());
        if valid {
            Ok(Self(code))
        } else {
            Err(ProtocolError::InvalidRoomCode(raw.to_string()))
        }
    }

    /// The normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RoomCode {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

/// Who a connection speaks for inside a room.
///
/// The host drives the shared screen and the phase advances; players hold
/// roles. JSON: `"host"` or `{"player": 3}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    Host,
    Player(PlayerId),
}

impl Seat {
    /// The player id, if this seat belongs to a player.
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Self::Host => None,
            Self::Player(id) => Some(*id),
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => f.write_str("host"),
            Self::Player(id) => write!(f, "{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// SystemMessage
// ---------------------------------------------------------------------------

/// Connection and room plumbing handled by the server itself.
///
/// Internally tagged: `{ "type": "JoinRoom", "code": "ABCD", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    // -- Connection lifecycle --
    /// Client → Server: first message on every connection.
    Handshake { version: u32 },

    /// Server → Client: handshake accepted.
    HandshakeAck { server_time: u64 },

    /// Either direction: the sender is closing the connection.
    Disconnect { reason: String },

    // -- Heartbeat --
    /// Client → Server: keep-alive. `client_time` is echoed back.
    Heartbeat { client_time: u64 },

    /// Server → Client: keep-alive reply for RTT estimation.
    HeartbeatAck { client_time: u64, server_time: u64 },

    // -- Room binding --
    /// Client → Server: open a new room and take its host seat. Without a
    /// code the server generates one.
    HostRoom {
        #[serde(default)]
        code: Option<RoomCode>,
        #[serde(default)]
        theme: Option<String>,
    },

    /// Server → Client: room created, this connection is the host.
    RoomHosted { code: RoomCode, token: String },

    /// Client → Server: join an existing room as a player.
    JoinRoom {
        code: RoomCode,
        name: String,
        #[serde(default)]
        avatar: String,
    },

    /// Server → Client: join accepted. `token` is the reconnection
    /// credential for this seat.
    RoomJoined {
        code: RoomCode,
        player_id: PlayerId,
        token: String,
    },

    /// Client → Server: reclaim a seat with a previously issued token.
    Reconnect { token: String },

    /// Server → Client: seat reclaimed. The token may be reused for the
    /// next reconnect.
    Reconnected {
        code: RoomCode,
        seat: Seat,
        token: String,
    },

    /// Client → Server: give up the seat for good.
    LeaveRoom,

    /// Server → Client: the room is gone.
    RoomClosed { code: RoomCode, reason: String },

    // -- Errors --
    /// Server → Client: a request failed. `code` follows HTTP conventions
    /// (400 bad request, 401 bad token, 403 not host, 404 unknown room,
    /// 409 conflict, 410 gone).
    Error { code: u16, message: String },
}

// ---------------------------------------------------------------------------
// Payload and Envelope
// ---------------------------------------------------------------------------

/// The content of a message: either a system message or game data.
///
/// Adjacently tagged so the handler can route without touching game bytes:
/// `{ "type": "System", "data": {...} }` or `{ "type": "Game", "data": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    System(SystemMessage),

    /// A game action or event, encoded by the same codec. Opaque here.
    Game(Vec<u8>),
}

/// The top-level message wrapper. Every frame on the wire is one Envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-direction sequence number, starting at 1.
    pub seq: u64,

    /// Milliseconds since the server started.
    pub timestamp: u64,

    pub payload: Payload,
}
