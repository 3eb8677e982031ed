//! Error types for game operations.

use nightfall_protocol::PlayerId;

use crate::{Phase, Power};

/// Why a game operation was refused.
///
/// Every variant is returned before any state is touched, except
/// [`GameError::ThemeTooSmall`], which is returned after the phase has been
/// rolled back to the lobby.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("{action} is not allowed during {phase}")]
    WrongPhase { action: &'static str, phase: Phase },

    #[error("only the host can do that")]
    NotHost,

    #[error("only players can do that")]
    NotAPlayer,

    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    #[error("unknown theme {0:?}")]
    UnknownTheme(String),

    #[error("name must be 1 to {max} characters")]
    InvalidName { max: usize },

    #[error("name {0:?} is already taken")]
    NameTaken(String),

    #[error("room is full ({max} players)")]
    RoomFull { max: usize },

    #[error("game already in progress")]
    GameInProgress,

    #[error("need at least {need} players, have {have}")]
    NotEnoughPlayers { have: usize, need: usize },

    #[error("theme {theme} needs at least {need} players, have {have}")]
    ThemeTooSmall {
        theme: &'static str,
        have: usize,
        need: usize,
    },

    #[error("player {0} is not alive")]
    ActorDead(PlayerId),

    #[error("player {player} does not have the {power} power")]
    WrongRole { player: PlayerId, power: Power },

    #[error("player {0} is not a valid target")]
    InvalidTarget(PlayerId),

    #[error("cannot target yourself")]
    SelfTarget,

    #[error("already acted this night")]
    AlreadyActed,

    #[error("kill votes are locked")]
    VotesLocked,

    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: Phase, to: Phase },
}

impl GameError {
    /// Wire error code for this rejection.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotHost => 403,
            Self::NameTaken(_) | Self::RoomFull { .. } | Self::GameInProgress => {
                409
            }
            _ => 400,
        }
    }
}
