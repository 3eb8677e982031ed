//! Win evaluation and the timer dispatcher.

use tokio::time::Instant;

use crate::{Alignment, GameEvent, Phase, RoomState, TimerPurpose};

/// Decides the winner from alive counts.
///
/// Evil wins once it is not outnumbered; good wins once no evil is left.
pub fn evaluate_winner(evil_alive: usize, good_alive: usize) -> Option<Alignment> {
    if evil_alive == 0 {
        Some(Alignment::Good)
    } else if evil_alive >= good_alive {
        Some(Alignment::Evil)
    } else {
        None
    }
}

impl RoomState {
    /// The winner the current alive set implies, if any.
    pub fn current_winner(&self) -> Option<Alignment> {
        evaluate_winner(
            self.alive_with(Alignment::Evil),
            self.alive_with(Alignment::Good),
        )
    }

    /// Ends the game if someone has won. Returns `true` if it ended.
    pub(crate) fn conclude_if_won(
        &mut self,
        now: Instant,
        events: &mut Vec<GameEvent>,
    ) -> bool {
        let Some(winner) = self.current_winner() else {
            return false;
        };
        let Ok(event) = self.enter(Phase::Ended, now) else {
            return false;
        };
        self.winner = Some(winner);
        self.win_condition = Some(self.theme.win_text(winner).to_string());
        tracing::info!(room = %self.code, %winner, "game ended");
        events.push(event);
        events.push(GameEvent::GameEnded { winner });
        true
    }

    /// Runs every scheduled action whose deadline is at or before `now`.
    ///
    /// Each one re-checks the condition that scheduled it against the
    /// current state, so a timer that lost its race does nothing (or
    /// reschedules) instead of failing.
    pub fn fire_due(&mut self, now: Instant) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Some(entry) = self.schedule.take_due(now) {
            match entry.purpose {
                TimerPurpose::LockIn => {
                    self.fire_lock_in(entry.target, now, &mut events);
                }
                TimerPurpose::NightResolution => {
                    self.fire_night_resolution(now, &mut events);
                }
                TimerPurpose::Countdown => {
                    self.fire_countdown(entry.target, now, &mut events);
                }
            }
        }
        events
    }
}
