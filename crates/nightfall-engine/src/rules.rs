//! Tunable game rules.

use std::time::Duration;

/// Per-room game rules.
///
/// Durations of zero are allowed; a zero `resolution_delay` resolves the
/// night in the same step that completes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rules {
    /// Players required before the host may start.
    pub min_players: usize,
    /// Lobby capacity.
    pub max_players: usize,
    /// How long a kill-vote consensus must hold before votes lock.
    pub lock_in: Duration,
    /// How long a day majority must hold before the accused is eliminated.
    pub countdown: Duration,
    /// Pause between night completion and its resolution.
    pub resolution_delay: Duration,
    /// Insert the STORY_INTRO phase between role assignment and the
    /// first night.
    pub story_intro: bool,
    /// Let a join request in a running game reclaim a disconnected
    /// player's seat by matching display name.
    pub allow_name_reclaim: bool,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            min_players: 4,
            max_players: 16,
            lock_in: Duration::from_secs(5),
            countdown: Duration::from_secs(10),
            resolution_delay: Duration::from_secs(2),
            story_intro: false,
            allow_name_reclaim: true,
        }
    }
}
