//! Timers as data.
//!
//! A pending timer is an entry in [`Schedule`]. The operation that decides
//! a timer should exist writes it in the same step, and the room actor only
//! ever sleeps until [`Schedule::next_deadline`]. There are no detached
//! timer handles to cancel or leak.

use nightfall_protocol::PlayerId;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// What a scheduled entry does when its deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerPurpose {
    /// Night: lock the kill votes if the consensus still holds.
    LockIn,
    /// Day: eliminate the accused if the majority still holds.
    Countdown,
    /// Night: apply the outcome of a completed night.
    NightResolution,
}

/// One pending timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scheduled {
    pub purpose: TimerPurpose,
    pub target: Option<PlayerId>,
    pub deadline: Instant,
}

/// The pending timers of one room, at most one per purpose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schedule {
    entries: Vec<Scheduled>,
}

impl Schedule {
    /// Schedules `purpose`, replacing any entry with the same purpose.
    pub fn set(
        &mut self,
        purpose: TimerPurpose,
        target: Option<PlayerId>,
        deadline: Instant,
    ) {
        self.cancel(purpose);
        self.entries.push(Scheduled {
            purpose,
            target,
            deadline,
        });
    }

    /// Drops the entry for `purpose`, if any.
    pub fn cancel(&mut self, purpose: TimerPurpose) {
        self.entries.retain(|e| e.purpose != purpose);
    }

    pub fn get(&self, purpose: TimerPurpose) -> Option<&Scheduled> {
        self.entries.iter().find(|e| e.purpose == purpose)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The earliest deadline, or `None` when nothing is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|e| e.deadline).min()
    }

    /// Removes and returns the earliest entry whose deadline is at or
    /// before `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<Scheduled> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= now)
            .min_by_key(|(_, e)| e.deadline)
            .map(|(i, _)| i)?;
        Some(self.entries.swap_remove(index))
    }
}
