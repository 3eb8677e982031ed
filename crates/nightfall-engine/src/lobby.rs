//! Joining, leaving, starting and readying up.

use nightfall_protocol::PlayerId;
use rand::Rng;
use tokio::time::Instant;

use crate::{GameError, GameEvent, Phase, Player, RoomState};

/// Longest display name, in characters.
pub const MAX_NAME_LEN: usize = 20;

/// Trims a display name and checks its length.
pub(crate) fn clean_name(raw: &str) -> Result<String, GameError> {
    let name = raw.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(GameError::InvalidName { max: MAX_NAME_LEN });
    }
    Ok(name.to_string())
}

/// Display names compare equal ignoring case, including non-ASCII letters.
pub(crate) fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

impl RoomState {
    /// Seats a new player in the lobby.
    pub fn join(&mut self, name: &str, avatar: &str) -> Result<PlayerId, GameError> {
        if self.phase.is_in_game() {
            return Err(GameError::GameInProgress);
        }
        let name = clean_name(name)?;
        if self.players.len() >= self.rules.max_players {
            return Err(GameError::RoomFull {
                max: self.rules.max_players,
            });
        }
        if self.name_taken(&name) {
            return Err(GameError::NameTaken(name));
        }

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        self.players.push(Player {
            id,
            name,
            avatar: avatar.to_string(),
            connected: true,
            ready: false,
        });
        tracing::info!(
            room = %self.code,
            player_id = %id,
            players = self.players.len(),
            "player joined"
        );
        Ok(id)
    }

    pub(crate) fn name_taken(&self, name: &str) -> bool {
        self.players
            .iter()
            .any(|p| same_name(&p.name, name))
    }

    /// Handles a lost connection or an explicit leave.
    ///
    /// In the lobby the seat is removed outright and `true` is returned.
    /// Once roles exist the seat is kept with `connected = false` so the
    /// player can come back.
    pub fn disconnect(&mut self, id: PlayerId) -> Result<bool, GameError> {
        if !self.phase.is_in_game() {
            let before = self.players.len();
            self.players.retain(|p| p.id != id);
            if self.players.len() == before {
                return Err(GameError::UnknownPlayer(id));
            }
            tracing::info!(room = %self.code, player_id = %id, "player left lobby");
            return Ok(true);
        }

        let player = self.player_mut(id)?;
        player.connected = false;
        tracing::info!(room = %self.code, player_id = %id, "player disconnected");
        Ok(false)
    }

    /// Host start: LOBBY → ROLE_ASSIGNMENT, then deal roles.
    ///
    /// A failed deal rolls the phase back to LOBBY and returns the deal
    /// error.
    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        now: Instant,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(Phase::Lobby, "start_game")?;
        let have = self.players.len();
        if have < self.rules.min_players {
            return Err(GameError::NotEnoughPlayers {
                have,
                need: self.rules.min_players,
            });
        }

        let mut events = vec![self.enter(Phase::RoleAssignment, now)?];
        let roles = match self.theme.deal(have, rng) {
            Ok(roles) => roles,
            Err(e) => {
                self.enter(Phase::Lobby, now)?;
                tracing::warn!(room = %self.code, error = %e, "role deal failed, back to lobby");
                return Err(e);
            }
        };

        for (player, role) in self.players.iter_mut().zip(roles) {
            player.ready = false;
            self.roles.insert(player.id, role);
        }
        self.alive = self.players.iter().map(|p| p.id).collect();
        events.push(GameEvent::RolesDealt);
        Ok(events)
    }

    /// A player confirms they have seen their role. The last confirmation
    /// moves the game on.
    pub fn ready(
        &mut self,
        id: PlayerId,
        now: Instant,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(Phase::RoleAssignment, "ready")?;
        let player = self.player_mut(id)?;
        if player.ready {
            return Ok(Vec::new());
        }
        player.ready = true;

        if !self.players.iter().all(|p| p.ready) {
            return Ok(Vec::new());
        }
        let next = if self.rules.story_intro {
            Phase::StoryIntro
        } else {
            Phase::NightPhase
        };
        Ok(vec![self.enter(next, now)?])
    }

    /// Host continue from STORY_INTRO, NIGHT_RESOLVED or DAY_RESOLVED.
    pub fn continue_phase(&mut self, now: Instant) -> Result<Vec<GameEvent>, GameError> {
        let next = self.phase.continue_target().ok_or(GameError::WrongPhase {
            action: "continue",
            phase: self.phase,
        })?;
        Ok(vec![self.enter(next, now)?])
    }
}
