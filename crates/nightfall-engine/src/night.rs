//! Night: kill-vote consensus, secret heals and investigations.
//!
//! ```text
//! kill votes ──consensus──→ LockIn timer ──still same target──→ locked
//!                                   └──different target──→ rescheduled
//! locked + all healers + all investigators ──→ NightResolution timer
//! NightResolution ──→ saved | eliminated ──→ NIGHT_RESOLVED | ENDED
//! ```

use std::collections::BTreeMap;

use nightfall_protocol::PlayerId;
use tokio::time::Instant;

use crate::state::{Investigation, half_rounded_up};
use crate::{
    Alignment, GameError, GameEvent, Phase, Power, RoomState, TimerPurpose,
};

impl RoomState {
    /// Kill votes needed for a consensus: `ceil(evil alive / 2)`.
    pub fn kill_votes_required(&self) -> usize {
        half_rounded_up(self.alive_with(Alignment::Evil))
    }

    /// The target holding a consensus right now, if any.
    ///
    /// Any target with at least
    /// [`kill_votes_required`](Self::kill_votes_required) votes qualifies.
    /// The pending lock-in target is kept while it still qualifies;
    /// otherwise the qualifying target with the most votes wins, lowest id
    /// on a tie.
    pub fn kill_consensus(&self) -> Option<PlayerId> {
        let pending = self
            .schedule
            .get(TimerPurpose::LockIn)
            .and_then(|s| s.target);
        self.consensus_preferring(pending)
    }

    /// Consensus, keeping `preferred` while it still qualifies.
    fn consensus_preferring(&self, preferred: Option<PlayerId>) -> Option<PlayerId> {
        let required = self.kill_votes_required();
        if required == 0 {
            return None;
        }

        let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
        for target in self.night.kill_votes.values() {
            *counts.entry(*target).or_default() += 1;
        }

        if let Some(target) = preferred {
            if counts.get(&target).is_some_and(|c| *c >= required) {
                return Some(target);
            }
        }

        let mut best: Option<(PlayerId, usize)> = None;
        for (target, count) in counts {
            if count >= required && best.is_none_or(|(_, top)| count > top) {
                best = Some((target, count));
            }
        }
        best.map(|(target, _)| target)
    }

    /// An evil player sets (`Some`) or clears (`None`) their kill vote.
    ///
    /// Any living player is a valid target, including teammates and the
    /// voter themselves.
    pub fn kill_vote(
        &mut self,
        voter: PlayerId,
        target: Option<PlayerId>,
        now: Instant,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(Phase::NightPhase, "kill_vote")?;
        self.require_alive(voter)?;
        if self.alignment_of(voter) != Some(Alignment::Evil) {
            return Err(GameError::WrongRole {
                player: voter,
                power: Power::Kill,
            });
        }
        if self.night.locked {
            return Err(GameError::VotesLocked);
        }
        if let Some(target) = target {
            self.require_alive_target(target)?;
        }

        match target {
            Some(target) => self.night.kill_votes.insert(voter, target),
            None => self.night.kill_votes.remove(&voter),
        };
        tracing::debug!(
            room = %self.code,
            %voter,
            target = ?target,
            "kill vote"
        );

        self.reevaluate_consensus(now);
        Ok(Vec::new())
    }

    /// A healer protects one living player for tonight. Self allowed.
    pub fn heal(
        &mut self,
        healer: PlayerId,
        target: PlayerId,
        now: Instant,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(Phase::NightPhase, "heal")?;
        self.require_alive(healer)?;
        self.require_power(healer, Power::Heal)?;
        if self.night.heals.contains_key(&healer) {
            return Err(GameError::AlreadyActed);
        }
        self.require_alive_target(target)?;

        self.night.heals.insert(healer, target);
        tracing::debug!(room = %self.code, %healer, "heal chosen");

        let mut events = Vec::new();
        self.check_night_completion(now, &mut events);
        Ok(events)
    }

    /// An investigator learns one other living player's alignment.
    pub fn investigate(
        &mut self,
        investigator: PlayerId,
        target: PlayerId,
        now: Instant,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(Phase::NightPhase, "investigate")?;
        self.require_alive(investigator)?;
        self.require_power(investigator, Power::Investigate)?;
        if self.night.investigations.contains_key(&investigator) {
            return Err(GameError::AlreadyActed);
        }
        if target == investigator {
            return Err(GameError::SelfTarget);
        }
        self.require_alive_target(target)?;
        let alignment = self
            .alignment_of(target)
            .ok_or(GameError::InvalidTarget(target))?;

        self.night
            .investigations
            .insert(investigator, Investigation { target, alignment });
        tracing::debug!(room = %self.code, %investigator, "investigation done");

        let mut events = Vec::new();
        self.check_night_completion(now, &mut events);
        Ok(events)
    }

    /// Votes locked, and every living healer and investigator has acted.
    pub fn night_complete(&self) -> bool {
        self.night.locked
            && self
                .living_with(Power::Heal)
                .all(|id| self.night.heals.contains_key(&id))
            && self
                .living_with(Power::Investigate)
                .all(|id| self.night.investigations.contains_key(&id))
    }

    /// Starts, keeps, replaces or cancels the lock-in timer to match the
    /// current consensus.
    fn reevaluate_consensus(&mut self, now: Instant) {
        if self.night.locked {
            return;
        }
        let consensus = self.kill_consensus();
        let pending = self
            .schedule
            .get(TimerPurpose::LockIn)
            .and_then(|s| s.target);

        match consensus {
            Some(target) if pending == Some(target) => {}
            Some(target) => {
                self.schedule.set(
                    TimerPurpose::LockIn,
                    Some(target),
                    now + self.rules.lock_in,
                );
                tracing::debug!(room = %self.code, %target, "kill consensus reached");
            }
            None => self.schedule.cancel(TimerPurpose::LockIn),
        }
    }

    /// The lock-in deadline passed for `target`.
    pub(crate) fn fire_lock_in(
        &mut self,
        target: Option<PlayerId>,
        now: Instant,
        events: &mut Vec<GameEvent>,
    ) {
        if self.phase != Phase::NightPhase || self.night.locked {
            return;
        }
        // The fired entry is already off the schedule.
        match self.consensus_preferring(target) {
            Some(current) if Some(current) == target => {
                self.night.locked = true;
                self.night.locked_target = Some(current);
                self.schedule.cancel(TimerPurpose::LockIn);
                tracing::info!(room = %self.code, target = %current, "kill votes locked");
                events.push(GameEvent::VotesLocked { target: current });
                self.check_night_completion(now, events);
            }
            Some(_) => self.reevaluate_consensus(now),
            None => self.schedule.cancel(TimerPurpose::LockIn),
        }
    }

    /// Schedules (or with zero delay, runs) the resolution once the night
    /// is complete.
    fn check_night_completion(&mut self, now: Instant, events: &mut Vec<GameEvent>) {
        if self.phase != Phase::NightPhase
            || !self.night_complete()
            || self.schedule.get(TimerPurpose::NightResolution).is_some()
        {
            return;
        }
        if self.rules.resolution_delay.is_zero() {
            self.resolve_night(now, events);
        } else {
            self.schedule.set(
                TimerPurpose::NightResolution,
                None,
                now + self.rules.resolution_delay,
            );
        }
    }

    pub(crate) fn fire_night_resolution(
        &mut self,
        now: Instant,
        events: &mut Vec<GameEvent>,
    ) {
        if self.phase == Phase::NightPhase && self.night_complete() {
            self.resolve_night(now, events);
        }
    }

    /// Applies the locked target: a heal on it saves them, otherwise they
    /// die. Then checks for a winner.
    fn resolve_night(&mut self, now: Instant, events: &mut Vec<GameEvent>) {
        if let Some(target) = self.night.locked_target {
            if self.night.heals.values().any(|t| *t == target) {
                self.night.saved = Some(target);
                tracing::info!(room = %self.code, player_id = %target, "night target saved");
                events.push(GameEvent::NightSaved { player: target });
            } else if self.eliminate(target) {
                self.night.eliminated = Some(target);
                events.push(GameEvent::NightEliminated { player: target });
            }
        }

        if !self.conclude_if_won(now, events) {
            if let Ok(event) = self.enter(Phase::NightResolved, now) {
                events.push(event);
            }
        }
    }
}
