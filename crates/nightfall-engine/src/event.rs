//! What a game operation changed.
//!
//! Operations return events instead of calling back into the room. The room
//! actor reads them to decide on private deliveries (secret roles) and
//! narration, then broadcasts one snapshot.

use nightfall_protocol::PlayerId;

use crate::{Alignment, Phase};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PhaseChanged { from: Phase, to: Phase },
    /// Every player now has a role; deliver each one privately.
    RolesDealt,
    VotesLocked { target: PlayerId },
    NightEliminated { player: PlayerId },
    NightSaved { player: PlayerId },
    DayEliminated { player: PlayerId },
    GameEnded { winner: Alignment },
}
