//! Session data types.

use std::fmt;
use std::time::Duration;

use nightfall_protocol::{RoomCode, Seat};
use tokio::time::Instant;

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a disconnected seat stays reclaimable.
    pub reconnect_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(300),
        }
    }
}

/// A seat in a specific room. Sessions are keyed by this.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub room: RoomCode,
    pub seat: Seat,
}

impl SessionKey {
    pub fn new(room: RoomCode, seat: Seat) -> Self {
        Self { room, seat }
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.room, self.seat)
    }
}

/// Connection state of a session.
///
/// ```text
/// Connected ──disconnect──→ Disconnected { since }
///     ↑                          │
///     └────mark_connected────────┤ (within grace)
///                                ↓ (grace elapsed)
///                             Expired
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Disconnected { since: Instant },
    Expired,
}

/// One seat's session.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: SessionKey,
    pub state: SessionState,
    /// 32 hex characters, unguessable. Stable across reconnects; replaced
    /// only when the seat is issued again.
    pub reconnect_token: String,
}
