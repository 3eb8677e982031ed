//! Client-facing game messages and seat-checked dispatch.
//!
//! These travel inside `Payload::Game` as JSON. The room actor decodes a
//! [`ClientAction`], calls [`RoomState::apply`] with the sender's seat, and
//! answers with [`ServerEvent`]s.

use nightfall_protocol::{PlayerId, Seat};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{GameError, GameEvent, Role, RoomState, Snapshot};

/// A game action sent by the host screen or a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    Ready,
    StartGame,
    Continue,
    KillVote {
        #[serde(default)]
        target: Option<PlayerId>,
    },
    Heal {
        target: PlayerId,
    },
    Investigate {
        target: PlayerId,
    },
    Accuse {
        #[serde(default)]
        target: Option<PlayerId>,
    },
}

impl ClientAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::StartGame => "start_game",
            Self::Continue => "continue",
            Self::KillVote { .. } => "kill_vote",
            Self::Heal { .. } => "heal",
            Self::Investigate { .. } => "investigate",
            Self::Accuse { .. } => "accuse",
        }
    }

    /// Whether only the host seat may send this.
    pub fn is_host_only(&self) -> bool {
        matches!(self, Self::StartGame | Self::Continue)
    }
}

/// A game message from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The full room view. Sent to every seat after each accepted change.
    Snapshot(Snapshot),
    /// Sent only to the player it belongs to.
    SecretRole { player_id: PlayerId, role: Role },
    /// Sent only to the seat whose action was refused.
    ActionRejected { code: u16, reason: String },
}

impl ServerEvent {
    pub fn rejected(error: &GameError) -> Self {
        Self::ActionRejected {
            code: error.code(),
            reason: error.to_string(),
        }
    }
}

impl RoomState {
    /// Runs `action` on behalf of `seat`.
    pub fn apply(
        &mut self,
        seat: Seat,
        action: ClientAction,
        now: Instant,
    ) -> Result<Vec<GameEvent>, GameError> {
        if action.is_host_only() {
            if seat != Seat::Host {
                return Err(GameError::NotHost);
            }
            return match action {
                ClientAction::StartGame => self.start_game(now, &mut rand::rng()),
                _ => self.continue_phase(now),
            };
        }

        let player = seat.player_id().ok_or(GameError::NotAPlayer)?;
        match action {
            ClientAction::Ready => self.ready(player, now),
            ClientAction::KillVote { target } => self.kill_vote(player, target, now),
            ClientAction::Heal { target } => self.heal(player, target, now),
            ClientAction::Investigate { target } => self.investigate(player, target, now),
            ClientAction::Accuse { target } => self.accuse(player, target, now),
            ClientAction::StartGame | ClientAction::Continue => Err(GameError::NotHost),
        }
    }
}
