//! Day: public accusations and the elimination countdown.

use std::collections::BTreeSet;

use nightfall_protocol::PlayerId;
use tokio::time::Instant;

use crate::state::half_rounded_up;
use crate::{GameError, GameEvent, Phase, RoomState, TimerPurpose};

impl RoomState {
    /// Accusations needed to start a countdown: `ceil(alive / 2)`.
    pub fn accusation_threshold(&self) -> usize {
        half_rounded_up(self.alive.len())
    }

    /// A living player accuses `target`, moves their accusation to it, or
    /// withdraws (`None`). Accusing the current target again withdraws.
    pub fn accuse(
        &mut self,
        accuser: PlayerId,
        target: Option<PlayerId>,
        now: Instant,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(Phase::DayPhase, "accuse")?;
        self.require_alive(accuser)?;
        if let Some(target) = target {
            if target == accuser {
                return Err(GameError::SelfTarget);
            }
            self.require_alive_target(target)?;
        }

        let current = self.day.accusation_of(accuser);
        if let Some(current) = current {
            self.withdraw(accuser, current);
        }
        match target {
            Some(target) if current != Some(target) => {
                self.day
                    .accusations
                    .entry(target)
                    .or_default()
                    .insert(accuser);
            }
            _ => {}
        }
        tracing::debug!(
            room = %self.code,
            %accuser,
            target = ?self.day.accusation_of(accuser),
            "accusation changed"
        );

        self.reevaluate_countdown(now);
        Ok(Vec::new())
    }

    fn withdraw(&mut self, accuser: PlayerId, accused: PlayerId) {
        if let Some(accusers) = self.day.accusations.get_mut(&accused) {
            accusers.remove(&accuser);
            if accusers.is_empty() {
                self.day.accusations.remove(&accused);
            }
        }
    }

    /// The unique most-accused player, if they meet the threshold.
    fn day_leader(&self) -> Option<PlayerId> {
        let threshold = self.accusation_threshold();
        let top = self.day.accusations.values().map(BTreeSet::len).max()?;
        if top < threshold {
            return None;
        }
        let mut leaders = self
            .day
            .accusations
            .iter()
            .filter(|(_, accusers)| accusers.len() == top);
        let (leader, _) = leaders.next()?;
        if leaders.next().is_some() {
            return None;
        }
        Some(*leader)
    }

    /// A running countdown keeps going while its target meets the
    /// threshold, even if someone else catches up. Otherwise it is
    /// cancelled and a unique leader at threshold starts a new one.
    fn reevaluate_countdown(&mut self, now: Instant) {
        let threshold = self.accusation_threshold();
        let running = self
            .schedule
            .get(TimerPurpose::Countdown)
            .and_then(|s| s.target);

        if let Some(target) = running {
            if self.day.count(target) >= threshold {
                return;
            }
            self.schedule.cancel(TimerPurpose::Countdown);
            tracing::debug!(room = %self.code, %target, "countdown cancelled");
        }

        if let Some(leader) = self.day_leader() {
            self.schedule.set(
                TimerPurpose::Countdown,
                Some(leader),
                now + self.rules.countdown,
            );
            tracing::debug!(room = %self.code, target = %leader, "countdown started");
        }
    }

    /// The countdown deadline passed for `target`.
    pub(crate) fn fire_countdown(
        &mut self,
        target: Option<PlayerId>,
        now: Instant,
        events: &mut Vec<GameEvent>,
    ) {
        if self.phase != Phase::DayPhase {
            return;
        }
        let valid = target.filter(|t| {
            self.is_alive(*t) && self.day.count(*t) >= self.accusation_threshold()
        });
        let Some(target) = valid else {
            self.reevaluate_countdown(now);
            return;
        };

        if self.eliminate(target) {
            self.day.eliminated = Some(target);
            events.push(GameEvent::DayEliminated { player: target });
        }
        if !self.conclude_if_won(now, events) {
            if let Ok(event) = self.enter(Phase::DayResolved, now) {
                events.push(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use nightfall_protocol::RoomCode;

    use super::*;
    use crate::{Power, Rules};

    fn day_with(powers: &[Power]) -> (RoomState, Instant) {
        let now = Instant::now();
        let rules = Rules {
            countdown: Duration::from_secs(10),
            ..Rules::default()
        };
        let mut state =
            RoomState::new(RoomCode::parse("DAYS").unwrap(), None, rules, now).unwrap();
        for (i, power) in powers.iter().enumerate() {
            let id = state.join(&format!("p{i}"), "").unwrap();
            let role = state.theme.role(*power);
            state.roles.insert(id, role);
            state.alive.insert(id);
        }
        state.phase = Phase::NightResolved;
        state.enter(Phase::DayPhase, now).unwrap();
        (state, now)
    }

    fn pid(n: u64) -> PlayerId {
        PlayerId(n)
    }

    use Power::{Citizen, Heal, Investigate, Kill};

    #[test]
    fn test_accuse_self_is_rejected() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen]);
        assert_eq!(state.accuse(pid(2), Some(pid(2)), now), Err(GameError::SelfTarget));
    }

    #[test]
    fn test_accuse_dead_target_is_rejected() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen]);
        state.alive.remove(&pid(4));
        assert_eq!(
            state.accuse(pid(2), Some(pid(4)), now),
            Err(GameError::InvalidTarget(pid(4)))
        );
    }

    #[test]
    fn test_accuse_dead_accuser_is_rejected() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen]);
        state.alive.remove(&pid(4));
        assert_eq!(
            state.accuse(pid(4), Some(pid(1)), now),
            Err(GameError::ActorDead(pid(4)))
        );
    }

    #[test]
    fn test_accuse_moves_between_targets() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen, Citizen]);

        state.accuse(pid(2), Some(pid(1)), now).unwrap();
        state.accuse(pid(2), Some(pid(3)), now).unwrap();

        assert_eq!(state.day().count(pid(1)), 0);
        assert!(!state.day().accusations.contains_key(&pid(1)));
        assert_eq!(state.day().accusation_of(pid(2)), Some(pid(3)));
    }

    #[test]
    fn test_accuse_same_target_twice_toggles_off() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen]);
        let before = state.day().clone();

        state.accuse(pid(2), Some(pid(1)), now).unwrap();
        state.accuse(pid(2), Some(pid(1)), now).unwrap();

        assert_eq!(state.day(), &before);
    }

    #[test]
    fn test_below_threshold_starts_no_countdown() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen, Citizen]);
        assert_eq!(state.accusation_threshold(), 3);

        state.accuse(pid(2), Some(pid(1)), now).unwrap();
        state.accuse(pid(3), Some(pid(1)), now).unwrap();

        assert!(state.schedule().get(TimerPurpose::Countdown).is_none());
    }

    #[test]
    fn test_running_countdown_keeps_priority_over_tied_rival() {
        let (mut state, now) =
            day_with(&[Kill, Heal, Investigate, Citizen, Citizen, Citizen]);
        assert_eq!(state.accusation_threshold(), 3);
        for accuser in [2, 3, 5] {
            state.accuse(pid(accuser), Some(pid(1)), now).unwrap();
        }
        let deadline = state.schedule().get(TimerPurpose::Countdown).unwrap().deadline;

        let later = now + Duration::from_secs(4);
        for accuser in [1, 4, 6] {
            state.accuse(pid(accuser), Some(pid(5)), later).unwrap();
        }

        assert_eq!(state.day().count(pid(5)), 3);
        let timer = state.schedule().get(TimerPurpose::Countdown).unwrap();
        assert_eq!(timer.target, Some(pid(1)));
        assert_eq!(timer.deadline, deadline);
    }

    #[test]
    fn test_countdown_fires_and_eliminates() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen, Citizen]);
        for accuser in 2..=4 {
            state.accuse(pid(accuser), Some(pid(5)), now).unwrap();
        }

        let events = state.fire_due(now + Duration::from_secs(10));

        assert!(events.contains(&GameEvent::DayEliminated { player: pid(5) }));
        assert!(!state.is_alive(pid(5)));
        assert_eq!(state.day().eliminated, Some(pid(5)));
        assert_eq!(state.phase(), Phase::DayResolved);
    }

    #[test]
    fn test_countdown_fire_without_majority_resumes_voting() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen]);
        state.accuse(pid(2), Some(pid(1)), now).unwrap();
        state.accuse(pid(3), Some(pid(1)), now).unwrap();
        // Stale entry: the accusations vanished without re-evaluation.
        state.day.accusations.clear();

        let events = state.fire_due(now + Duration::from_secs(10));

        assert!(events.is_empty());
        assert_eq!(state.alive().len(), 4);
        assert_eq!(state.phase(), Phase::DayPhase);
        assert!(state.schedule().is_empty());
    }

    #[test]
    fn test_day_elimination_of_last_evil_ends_game() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen]);
        state.accuse(pid(2), Some(pid(1)), now).unwrap();
        state.accuse(pid(3), Some(pid(1)), now).unwrap();

        let events = state.fire_due(now + Duration::from_secs(10));

        assert_eq!(state.phase(), Phase::Ended);
        assert_eq!(state.winner(), Some(crate::Alignment::Good));
        assert!(events.contains(&GameEvent::GameEnded {
            winner: crate::Alignment::Good
        }));
    }

    #[test]
    fn test_day_entry_clears_accusations() {
        let (mut state, now) = day_with(&[Kill, Citizen, Citizen, Citizen, Citizen]);
        state.accuse(pid(2), Some(pid(3)), now).unwrap();
        state.phase = Phase::NightResolved;

        state.continue_phase(now).unwrap();

        assert!(state.day().accusations.is_empty());
        assert!(state.schedule().is_empty());
    }
}
