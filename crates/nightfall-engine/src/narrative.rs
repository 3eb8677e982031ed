//! Narration requests and their canned fallbacks.
//!
//! The engine never waits for narration. It describes what should be
//! narrated as a [`NarrativeRequest`]; the room actor hands that to a
//! narrator service with a timeout and feeds the text (or the canned
//! [`fallback`](NarrativeRequest::fallback)) back through
//! [`RoomState::apply_narration`].

use nightfall_protocol::PlayerId;
use serde::Serialize;

use crate::theme::Theme;
use crate::{Alignment, GameEvent, Phase, RoomState};

/// The moment to narrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum NarrativeCue {
    Intro,
    NightDeath { name: String, role: String },
    NightSaved { name: String },
    DayDeath { name: String, role: String },
    EndGame { winner: Alignment },
}

/// Everything a narrator needs to write one passage.
#[derive(Debug, Clone)]
pub struct NarrativeRequest {
    pub theme: &'static Theme,
    /// Display names of everyone seated, in join order.
    pub roster: Vec<String>,
    pub cue: NarrativeCue,
    /// Phase and round the request was made in. Text arriving after the
    /// game has moved on is dropped.
    pub phase: Phase,
    pub round: u32,
}

impl NarrativeRequest {
    /// The theme's canned text for this cue.
    pub fn fallback(&self) -> String {
        let template = match &self.cue {
            NarrativeCue::Intro => self.theme.intro,
            NarrativeCue::NightDeath { .. } => self.theme.night_death,
            NarrativeCue::NightSaved { .. } => self.theme.night_saved,
            NarrativeCue::DayDeath { .. } => self.theme.day_death,
            NarrativeCue::EndGame { winner } => self.theme.win_text(*winner),
        };
        let (name, role) = match &self.cue {
            NarrativeCue::NightDeath { name, role } | NarrativeCue::DayDeath { name, role } => {
                (name.as_str(), role.as_str())
            }
            NarrativeCue::NightSaved { name } => (name.as_str(), ""),
            _ => ("", ""),
        };
        template.replace("{name}", name).replace("{role}", role)
    }
}

impl RoomState {
    /// Picks what to narrate after an operation produced `events`.
    ///
    /// Only the last narratable event counts, so a night kill that ends the
    /// game is narrated as the ending.
    pub fn narrative_for(&self, events: &[GameEvent]) -> Option<NarrativeRequest> {
        let cue = events.iter().rev().find_map(|event| self.cue_for(event))?;
        Some(NarrativeRequest {
            theme: self.theme,
            roster: self.players.iter().map(|p| p.name.clone()).collect(),
            cue,
            phase: self.phase,
            round: self.round,
        })
    }

    fn cue_for(&self, event: &GameEvent) -> Option<NarrativeCue> {
        let role_name = |id: PlayerId| {
            self.role_of(id)
                .map(|r| r.name.clone())
                .unwrap_or_default()
        };
        match *event {
            GameEvent::PhaseChanged {
                to: Phase::StoryIntro,
                ..
            }
            | GameEvent::PhaseChanged {
                from: Phase::RoleAssignment,
                to: Phase::NightPhase,
            } => Some(NarrativeCue::Intro),
            GameEvent::NightEliminated { player } => Some(NarrativeCue::NightDeath {
                name: self.name_of(player),
                role: role_name(player),
            }),
            GameEvent::NightSaved { player } => Some(NarrativeCue::NightSaved {
                name: self.name_of(player),
            }),
            GameEvent::DayEliminated { player } => Some(NarrativeCue::DayDeath {
                name: self.name_of(player),
                role: role_name(player),
            }),
            GameEvent::GameEnded { winner } => Some(NarrativeCue::EndGame { winner }),
            _ => None,
        }
    }

    /// Stores narration if the game is still where `request` was made.
    /// Returns `true` if the text was applied.
    pub fn apply_narration(&mut self, request: &NarrativeRequest, text: String) -> bool {
        if self.phase != request.phase || self.round != request.round {
            tracing::debug!(room = %self.code, "dropping stale narration");
            return false;
        }
        self.narration = Some(text);
        true
    }
}
