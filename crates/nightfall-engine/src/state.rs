//! The authoritative state of one room.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use nightfall_protocol::{PlayerId, RoomCode};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::theme::{DEFAULT_THEME, Theme, find_theme};
use crate::{Alignment, GameError, GameEvent, Phase, Player, Power, Role, Rules, Schedule};

/// Result of one investigation, visible to the investigator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigation {
    pub target: PlayerId,
    pub alignment: Alignment,
}

/// Everything that happens during one night. Reset on every night entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NightState {
    /// Evil voter → chosen target. Mutable until locked.
    pub kill_votes: BTreeMap<PlayerId, PlayerId>,
    pub locked: bool,
    pub locked_target: Option<PlayerId>,
    /// Healer → protected player. Single-shot.
    pub heals: BTreeMap<PlayerId, PlayerId>,
    /// Investigator → result. Single-shot.
    pub investigations: BTreeMap<PlayerId, Investigation>,
    pub eliminated: Option<PlayerId>,
    pub saved: Option<PlayerId>,
}

/// Everything that happens during one day. Reset on every day entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayState {
    /// Accused → accusers. Empty sets are never stored.
    pub accusations: BTreeMap<PlayerId, BTreeSet<PlayerId>>,
    pub eliminated: Option<PlayerId>,
}

impl DayState {
    /// The player `accuser` currently accuses, if any.
    pub fn accusation_of(&self, accuser: PlayerId) -> Option<PlayerId> {
        self.accusations
            .iter()
            .find(|(_, accusers)| accusers.contains(&accuser))
            .map(|(accused, _)| *accused)
    }

    pub fn count(&self, accused: PlayerId) -> usize {
        self.accusations.get(&accused).map_or(0, BTreeSet::len)
    }
}

/// The single source of truth for a room's game.
///
/// All mutation goes through the phase-gated operations in the `lobby`,
/// `night`, `day` and `reconnect` modules. Each returns the events it
/// produced; a rejected operation returns an error and leaves the state
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomState {
    pub(crate) code: RoomCode,
    pub(crate) rules: Rules,
    pub(crate) theme: &'static Theme,
    pub(crate) phase: Phase,
    pub(crate) players: Vec<Player>,
    pub(crate) roles: HashMap<PlayerId, Role>,
    pub(crate) alive: BTreeSet<PlayerId>,
    pub(crate) night: NightState,
    pub(crate) day: DayState,
    pub(crate) schedule: Schedule,
    pub(crate) winner: Option<Alignment>,
    pub(crate) win_condition: Option<String>,
    pub(crate) phase_started_at: Instant,
    pub(crate) round: u32,
    pub(crate) narration: Option<String>,
    pub(crate) next_player_id: u64,
    pub(crate) seq: u64,
}

impl RoomState {
    /// Creates a room in the lobby.
    ///
    /// `theme` of `None` picks the default theme; an unknown id is an error.
    pub fn new(
        code: RoomCode,
        theme: Option<&str>,
        rules: Rules,
        now: Instant,
    ) -> Result<Self, GameError> {
        let theme = find_theme(theme.unwrap_or(DEFAULT_THEME))?;
        Ok(Self {
            code,
            rules,
            theme,
            phase: Phase::Lobby,
            players: Vec::new(),
            roles: HashMap::new(),
            alive: BTreeSet::new(),
            night: NightState::default(),
            day: DayState::default(),
            schedule: Schedule::default(),
            winner: None,
            win_condition: None,
            phase_started_at: now,
            round: 0,
            narration: None,
            next_player_id: 1,
            seq: 0,
        })
    }

    // -- Read access --

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn theme(&self) -> &'static Theme {
        self.theme
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn role_of(&self, id: PlayerId) -> Option<&Role> {
        self.roles.get(&id)
    }

    pub fn is_alive(&self, id: PlayerId) -> bool {
        self.alive.contains(&id)
    }

    pub fn alive(&self) -> &BTreeSet<PlayerId> {
        &self.alive
    }

    pub fn night(&self) -> &NightState {
        &self.night
    }

    pub fn day(&self) -> &DayState {
        &self.day
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// When the room actor next needs to call
    /// [`fire_due`](Self::fire_due).
    pub fn next_deadline(&self) -> Option<Instant> {
        self.schedule.next_deadline()
    }

    pub fn winner(&self) -> Option<Alignment> {
        self.winner
    }

    pub fn win_condition(&self) -> Option<&str> {
        self.win_condition.as_deref()
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn narration(&self) -> Option<&str> {
        self.narration.as_deref()
    }

    // -- Helpers shared by the phase modules --

    pub(crate) fn require_phase(
        &self,
        phase: Phase,
        action: &'static str,
    ) -> Result<(), GameError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(GameError::WrongPhase {
                action,
                phase: self.phase,
            })
        }
    }

    pub(crate) fn player_mut(
        &mut self,
        id: PlayerId,
    ) -> Result<&mut Player, GameError> {
        self.players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GameError::UnknownPlayer(id))
    }

    /// The actor must be seated and alive.
    pub(crate) fn require_alive(&self, id: PlayerId) -> Result<(), GameError> {
        if self.player(id).is_none() {
            return Err(GameError::UnknownPlayer(id));
        }
        if !self.is_alive(id) {
            return Err(GameError::ActorDead(id));
        }
        Ok(())
    }

    /// The actor must hold a role with `power`.
    pub(crate) fn require_power(
        &self,
        id: PlayerId,
        power: Power,
    ) -> Result<(), GameError> {
        match self.roles.get(&id) {
            Some(role) if role.power == power => Ok(()),
            _ => Err(GameError::WrongRole { player: id, power }),
        }
    }

    pub(crate) fn require_alive_target(
        &self,
        target: PlayerId,
    ) -> Result<(), GameError> {
        if self.is_alive(target) {
            Ok(())
        } else {
            Err(GameError::InvalidTarget(target))
        }
    }

    pub(crate) fn alignment_of(&self, id: PlayerId) -> Option<Alignment> {
        self.roles.get(&id).map(|r| r.alignment)
    }

    /// Living players whose role has `power`.
    pub(crate) fn living_with(
        &self,
        power: Power,
    ) -> impl Iterator<Item = PlayerId> + '_ {
        self.alive
            .iter()
            .copied()
            .filter(move |id| self.roles.get(id).is_some_and(|r| r.power == power))
    }

    pub(crate) fn alive_with(&self, alignment: Alignment) -> usize {
        self.alive
            .iter()
            .filter(|id| self.alignment_of(**id) == Some(alignment))
            .count()
    }

    pub(crate) fn name_of(&self, id: PlayerId) -> String {
        self.player(id)
            .map_or_else(|| id.to_string(), |p| p.name.clone())
    }

    /// Removes `id` from the alive set. The only place the set shrinks.
    pub(crate) fn eliminate(&mut self, id: PlayerId) -> bool {
        let removed = self.alive.remove(&id);
        if removed {
            tracing::info!(
                room = %self.code,
                player_id = %id,
                alive = self.alive.len(),
                "player eliminated"
            );
        }
        removed
    }

    /// Moves to `to` along a legal edge and applies that phase's entry
    /// resets.
    ///
    /// Every transition drops all pending timers: each phase schedules its
    /// own from scratch.
    pub(crate) fn enter(
        &mut self,
        to: Phase,
        now: Instant,
    ) -> Result<GameEvent, GameError> {
        let from = self.phase;
        if !from.can_transition_to(to) {
            return Err(GameError::IllegalTransition { from, to });
        }

        self.schedule.clear();
        match to {
            Phase::NightPhase => {
                self.night = NightState::default();
                self.round += 1;
            }
            Phase::DayPhase => {
                self.day = DayState::default();
            }
            _ => {}
        }

        self.phase = to;
        self.phase_started_at = now;
        tracing::info!(
            room = %self.code,
            %from,
            %to,
            round = self.round,
            "phase changed"
        );
        Ok(GameEvent::PhaseChanged { from, to })
    }
}

/// `ceil(n / 2)`, the majority size used by both resolvers.
pub(crate) fn half_rounded_up(n: usize) -> usize {
    n.div_ceil(2)
}
