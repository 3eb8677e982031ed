//! The phase state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The phase a room is in.
///
/// ```text
/// Lobby → RoleAssignment → [StoryIntro] → NightPhase ⇄ … → Ended
///            ↓ (deal failed)                  ↓
///          Lobby            NightResolved → DayPhase → DayResolved → NightPhase
/// ```
///
/// - **Lobby**: accepting joins; the host starts the game.
/// - **RoleAssignment**: roles dealt; each player confirms ready.
/// - **StoryIntro**: optional; the host continues when the intro is read.
/// - **NightPhase**: secret kill votes, heals and investigations.
/// - **NightResolved**: night outcome shown; host continues.
/// - **DayPhase**: public accusations.
/// - **DayResolved**: day outcome shown; host continues.
/// - **Ended**: terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Lobby,
    RoleAssignment,
    StoryIntro,
    NightPhase,
    NightResolved,
    DayPhase,
    DayResolved,
    Ended,
}

impl Phase {
    /// Returns `true` if moving from `self` to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (Lobby, RoleAssignment)
                | (RoleAssignment, NightPhase)
                | (RoleAssignment, StoryIntro)
                | (RoleAssignment, Lobby)
                | (StoryIntro, NightPhase)
                | (NightPhase, NightResolved)
                | (NightPhase, Ended)
                | (NightResolved, DayPhase)
                | (DayPhase, DayResolved)
                | (DayPhase, Ended)
                | (DayResolved, NightPhase)
        )
    }

    /// The phase a host "continue" leads to, if continuing is allowed here.
    pub fn continue_target(self) -> Option<Self> {
        match self {
            Self::StoryIntro | Self::DayResolved => Some(Self::NightPhase),
            Self::NightResolved => Some(Self::DayPhase),
            _ => None,
        }
    }

    /// Any phase after the lobby: roles exist and seats are permanent.
    pub fn is_in_game(self) -> bool {
        !matches!(self, Self::Lobby)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lobby => "LOBBY",
            Self::RoleAssignment => "ROLE_ASSIGNMENT",
            Self::StoryIntro => "STORY_INTRO",
            Self::NightPhase => "NIGHT_PHASE",
            Self::NightResolved => "NIGHT_RESOLVED",
            Self::DayPhase => "DAY_PHASE",
            Self::DayResolved => "DAY_RESOLVED",
            Self::Ended => "ENDED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 8] = [
        Phase::Lobby,
        Phase::RoleAssignment,
        Phase::StoryIntro,
        Phase::NightPhase,
        Phase::NightResolved,
        Phase::DayPhase,
        Phase::DayResolved,
        Phase::Ended,
    ];

    #[test]
    fn test_phase_can_transition_to_follows_game_loop() {
        assert!(Phase::Lobby.can_transition_to(Phase::RoleAssignment));
        assert!(Phase::RoleAssignment.can_transition_to(Phase::NightPhase));
        assert!(Phase::NightPhase.can_transition_to(Phase::NightResolved));
        assert!(Phase::NightResolved.can_transition_to(Phase::DayPhase));
        assert!(Phase::DayPhase.can_transition_to(Phase::DayResolved));
        assert!(Phase::DayResolved.can_transition_to(Phase::NightPhase));
    }

    #[test]
    fn test_phase_can_transition_to_rejects_skips() {
        assert!(!Phase::Lobby.can_transition_to(Phase::NightPhase));
        assert!(!Phase::NightPhase.can_transition_to(Phase::DayPhase));
        assert!(!Phase::DayResolved.can_transition_to(Phase::DayPhase));
        assert!(!Phase::NightResolved.can_transition_to(Phase::Ended));
    }

    #[test]
    fn test_phase_ended_is_terminal() {
        for target in ALL {
            assert!(!Phase::Ended.can_transition_to(target));
        }
    }

    #[test]
    fn test_phase_only_deal_rollback_returns_to_lobby() {
        for from in ALL {
            let allowed = from.can_transition_to(Phase::Lobby);
            assert_eq!(allowed, from == Phase::RoleAssignment, "{from}");
        }
    }

    #[test]
    fn test_phase_continue_target() {
        assert_eq!(Phase::StoryIntro.continue_target(), Some(Phase::NightPhase));
        assert_eq!(Phase::NightResolved.continue_target(), Some(Phase::DayPhase));
        assert_eq!(Phase::DayResolved.continue_target(), Some(Phase::NightPhase));
        assert_eq!(Phase::NightPhase.continue_target(), None);
        assert_eq!(Phase::Ended.continue_target(), None);
    }

    #[test]
    fn test_phase_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Phase::NightResolved).unwrap();
        assert_eq!(json, "\"NIGHT_RESOLVED\"");
        assert_eq!(Phase::DayPhase.to_string(), "DAY_PHASE");
    }
}
