//! Seat sessions for Nightfall.
//!
//! A session records that some connection holds a seat (the host seat or a
//! player seat) in a room, and carries the reconnection token the client
//! presents to reclaim that seat after its socket drops.
//!
//! ```text
//! Room layer (above)     ← trusts the seat this crate resolves
//!     ↕
//! Session layer          ← token → (room, seat), grace-period expiry
//!     ↕
//! Protocol layer (below) ← RoomCode, Seat
//! ```
//!
//! Sessions hold no game state. Whether a reconnect is legal for the game
//! is the room's decision; this crate only answers "which seat does this
//! token name, and is it still within its grace period".

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Session, SessionConfig, SessionKey, SessionState};
