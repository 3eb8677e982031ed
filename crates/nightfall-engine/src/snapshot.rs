//! The broadcast projector.
//!
//! One [`Snapshot`] is built after every accepted mutation and sent, byte
//! for byte, to the host screen and every player. Secret fields are in it
//! too; each client shows only what its own seat may see.

use nightfall_protocol::{PlayerId, RoomCode};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{Alignment, Phase, Power, Role, RoomState, TimerPurpose};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub connected: bool,
    pub alive: bool,
    pub ready: bool,
    pub role: Option<Role>,
    /// Has used their night power this night (kill vote cast, heal or
    /// investigation done).
    pub night_action_done: bool,
    pub kill_vote: Option<PlayerId>,
}

/// Who each power may legally target in the current phase. Empty outside
/// the phase that uses it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetLists {
    pub kill: Vec<PlayerId>,
    pub heal: Vec<PlayerId>,
    pub investigate: Vec<PlayerId>,
    pub accuse: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationView {
    pub investigator: PlayerId,
    pub target: PlayerId,
    pub alignment: Alignment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccusationView {
    pub accused: PlayerId,
    pub name: String,
    pub accusers: Vec<PlayerId>,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerView {
    pub target: Option<PlayerId>,
    pub remaining_ms: u64,
}

/// The full public view of a room at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub seq: u64,
    pub code: RoomCode,
    pub phase: Phase,
    pub theme: String,
    pub theme_name: String,
    pub round: u32,
    pub players: Vec<PlayerView>,
    pub targets: TargetLists,
    pub kill_votes_required: usize,
    pub votes_locked: bool,
    pub locked_target: Option<PlayerId>,
    pub investigations: Vec<InvestigationView>,
    /// Most-accused first.
    pub accusations: Vec<AccusationView>,
    pub accusation_threshold: usize,
    pub consensus: Option<TimerView>,
    pub countdown: Option<TimerView>,
    pub resolution: Option<TimerView>,
    pub eliminated: Option<PlayerId>,
    pub saved: Option<PlayerId>,
    pub day_eliminated: Option<PlayerId>,
    pub winner: Option<Alignment>,
    pub win_condition: Option<String>,
    pub narration: Option<String>,
    pub phase_elapsed_ms: u64,
}

impl RoomState {
    /// Projects the current state and advances the snapshot sequence.
    pub fn snapshot(&mut self, now: Instant) -> Snapshot {
        self.seq += 1;
        self.project(now)
    }

    /// Builds a snapshot without advancing the sequence.
    pub fn project(&self, now: Instant) -> Snapshot {
        let alive: Vec<PlayerId> = self.alive.iter().copied().collect();
        let targets = match self.phase {
            Phase::NightPhase => TargetLists {
                kill: if self.night.locked { Vec::new() } else { alive.clone() },
                heal: alive.clone(),
                investigate: alive
                    .iter()
                    .copied()
                    .filter(|id| {
                        self.roles
                            .get(id)
                            .is_none_or(|r| r.power != Power::Investigate)
                    })
                    .collect(),
                accuse: Vec::new(),
            },
            Phase::DayPhase => TargetLists {
                accuse: alive.clone(),
                ..TargetLists::default()
            },
            _ => TargetLists::default(),
        };

        let mut accusations: Vec<AccusationView> = self
            .day
            .accusations
            .iter()
            .map(|(accused, accusers)| AccusationView {
                accused: *accused,
                name: self.name_of(*accused),
                accusers: accusers.iter().copied().collect(),
                count: accusers.len(),
            })
            .collect();
        accusations.sort_by(|a, b| b.count.cmp(&a.count).then(a.accused.cmp(&b.accused)));

        let timer = |purpose| {
            self.schedule.get(purpose).map(|s| TimerView {
                target: s.target,
                remaining_ms: millis(s.deadline.saturating_duration_since(now)),
            })
        };

        Snapshot {
            seq: self.seq,
            code: self.code.clone(),
            phase: self.phase,
            theme: self.theme.id.to_string(),
            theme_name: self.theme.name.to_string(),
            round: self.round,
            players: self.players.iter().filter_map(|p| self.player_view(p.id)).collect(),
            targets,
            kill_votes_required: self.kill_votes_required(),
            votes_locked: self.night.locked,
            locked_target: self.night.locked_target,
            investigations: self
                .night
                .investigations
                .iter()
                .map(|(investigator, result)| InvestigationView {
                    investigator: *investigator,
                    target: result.target,
                    alignment: result.alignment,
                })
                .collect(),
            accusations,
            accusation_threshold: self.accusation_threshold(),
            consensus: timer(TimerPurpose::LockIn),
            countdown: timer(TimerPurpose::Countdown),
            resolution: timer(TimerPurpose::NightResolution),
            eliminated: self.night.eliminated,
            saved: self.night.saved,
            day_eliminated: self.day.eliminated,
            winner: self.winner,
            win_condition: self.win_condition.clone(),
            narration: self.narration.clone(),
            phase_elapsed_ms: millis(now.saturating_duration_since(self.phase_started_at)),
        }
    }

    fn player_view(&self, id: PlayerId) -> Option<PlayerView> {
        let player = self.player(id)?;
        let role = self.roles.get(&id).cloned();
        let night_action_done = match role.as_ref().map(|r| r.power) {
            Some(Power::Kill) => self.night.kill_votes.contains_key(&id),
            Some(Power::Heal) => self.night.heals.contains_key(&id),
            Some(Power::Investigate) => self.night.investigations.contains_key(&id),
            _ => false,
        };
        Some(PlayerView {
            id,
            name: player.name.clone(),
            avatar: player.avatar.clone(),
            connected: player.connected,
            alive: self.is_alive(id),
            ready: player.ready,
            role,
            night_action_done,
            kill_vote: self.night.kill_votes.get(&id).copied(),
        })
    }
}

fn millis(d: std::time::Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Rules;

    fn night_room(now: Instant) -> RoomState {
        let mut state =
            RoomState::new(RoomCode::parse("SNAP").unwrap(), None, Rules::default(), now)
                .unwrap();
        let powers = [Power::Kill, Power::Heal, Power::Citizen, Power::Citizen, Power::Citizen];
        for (i, power) in powers.into_iter().enumerate() {
            let id = state.join(&format!("p{i}"), "").unwrap();
            let role = state.theme.role(power);
            state.roles.insert(id, role);
            state.alive.insert(id);
        }
        state.phase = Phase::DayResolved;
        state.enter(Phase::NightPhase, now).unwrap();
        state
    }

    #[test]
    fn test_snapshot_advances_sequence() {
        let now = Instant::now();
        let mut state = night_room(now);

        let first = state.snapshot(now);
        let second = state.snapshot(now);

        assert_eq!(second.seq, first.seq + 1);
        assert_eq!(state.project(now).seq, second.seq);
    }

    #[test]
    fn test_snapshot_night_exposes_targets_and_consensus_timer() {
        let now = Instant::now();
        let mut state = night_room(now);
        state.kill_vote(PlayerId(1), Some(PlayerId(3)), now).unwrap();

        let snap = state.project(now + Duration::from_millis(1500));

        assert_eq!(snap.targets.kill.len(), 5);
        assert!(snap.targets.accuse.is_empty());
        assert_eq!(snap.kill_votes_required, 1);
        assert_eq!(
            snap.consensus,
            Some(TimerView {
                target: Some(PlayerId(3)),
                remaining_ms: 3500
            })
        );
        let voter = &snap.players[0];
        assert!(voter.night_action_done);
        assert_eq!(voter.kill_vote, Some(PlayerId(3)));
        assert_eq!(voter.role.as_ref().unwrap().alignment, Alignment::Evil);
        assert!(!snap.players[1].night_action_done);
    }

    #[test]
    fn test_snapshot_investigate_targets_exclude_investigator() {
        let now = Instant::now();
        let mut state = night_room(now);
        let investigator = state.theme.role(Power::Investigate);
        state.roles.insert(PlayerId(3), investigator);

        let snap = state.project(now);

        assert_eq!(snap.targets.investigate.len(), 4);
        assert!(!snap.targets.investigate.contains(&PlayerId(3)));
        assert!(snap.targets.heal.contains(&PlayerId(3)));
    }

    #[test]
    fn test_snapshot_accusations_sorted_by_count() {
        let now = Instant::now();
        let mut state = night_room(now);
        state.phase = Phase::NightResolved;
        state.continue_phase(now).unwrap();
        state.accuse(PlayerId(2), Some(PlayerId(5)), now).unwrap();
        state.accuse(PlayerId(3), Some(PlayerId(1)), now).unwrap();
        state.accuse(PlayerId(4), Some(PlayerId(1)), now).unwrap();

        let snap = state.project(now);

        assert_eq!(snap.accusations[0].accused, PlayerId(1));
        assert_eq!(snap.accusations[0].count, 2);
        assert_eq!(snap.accusations[0].name, "p0");
        assert_eq!(snap.accusations[1].accused, PlayerId(5));
        assert_eq!(snap.accusation_threshold, 3);
        assert_eq!(snap.targets.accuse.len(), 5);
    }

    #[test]
    fn test_snapshot_serializes_phase_name() {
        let now = Instant::now();
        let state = night_room(now);
        let json = serde_json::to_value(state.project(now)).unwrap();

        assert_eq!(json["phase"], "NIGHT_PHASE");
        assert_eq!(json["code"], "SNAP");
        assert_eq!(json["players"][0]["role"]["power"], "kill");
    }
}
