//! Seat recovery after a lost connection.
//!
//! Game state is keyed by [`PlayerId`], which never changes, so recovering
//! a seat is only a matter of flipping `connected` back on. The room actor
//! rebinds the connection in the same command.

use nightfall_protocol::PlayerId;

use crate::lobby::{clean_name, same_name};
use crate::{GameError, RoomState};

/// How a join request was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new seat in the lobby.
    Joined(PlayerId),
    /// An existing, disconnected seat reclaimed by name mid-game.
    Reclaimed(PlayerId),
}

impl JoinOutcome {
    pub fn player_id(self) -> PlayerId {
        match self {
            Self::Joined(id) | Self::Reclaimed(id) => id,
        }
    }
}

impl RoomState {
    /// Marks a seat connected again after its token was verified.
    ///
    /// Roles, alive status, readiness and every vote, heal, investigation
    /// and accusation are untouched.
    pub fn reconnect(&mut self, id: PlayerId) -> Result<(), GameError> {
        let player = self.player_mut(id)?;
        player.connected = true;
        tracing::info!(room = %self.code, player_id = %id, "player reconnected");
        Ok(())
    }

    /// Joins the lobby, or during a game reclaims a disconnected seat whose
    /// name matches (case-insensitive) when the rules allow it.
    pub fn join_or_reclaim(
        &mut self,
        name: &str,
        avatar: &str,
    ) -> Result<JoinOutcome, GameError> {
        if !self.phase.is_in_game() {
            return self.join(name, avatar).map(JoinOutcome::Joined);
        }
        if !self.rules.allow_name_reclaim {
            return Err(GameError::GameInProgress);
        }

        let name = clean_name(name)?;
        let seat = self
            .players
            .iter()
            .find(|p| same_name(&p.name, &name))
            .map(|p| (p.id, p.connected));
        match seat {
            Some((id, false)) => {
                self.reconnect(id)?;
                tracing::info!(room = %self.code, player_id = %id, "seat reclaimed by name");
                Ok(JoinOutcome::Reclaimed(id))
            }
            Some((_, true)) => Err(GameError::NameTaken(name)),
            None => Err(GameError::GameInProgress),
        }
    }
}
