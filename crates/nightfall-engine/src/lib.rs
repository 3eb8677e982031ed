//! The authoritative game engine for one Nightfall room.
//!
//! [`RoomState`] is plain synchronous data. Every operation takes the
//! current time, validates against the phase and the actor's role, mutates
//! in one step, and returns the [`GameEvent`]s it produced. Timers are
//! entries in a [`Schedule`] rather than spawned tasks; the owner sleeps
//! until [`RoomState::next_deadline`] and calls [`RoomState::fire_due`].
//!
//! ```text
//! Room actor (nightfall-room)
//!     │  apply(seat, ClientAction, now)    fire_due(now)
//!     ▼
//! RoomState ── lobby / night / day / win / reconnect ──→ Vec<GameEvent>
//!     │
//!     └── snapshot(now) → Snapshot (broadcast)
//! ```
//!
//! Nothing here does I/O, so the whole rule set is testable with a fixed
//! `Instant` and no runtime.

mod action;
mod day;
mod error;
mod event;
mod lobby;
mod model;
mod narrative;
mod night;
mod phase;
mod reconnect;
mod rules;
mod schedule;
mod snapshot;
mod state;
pub mod theme;
mod win;

pub use action::{ClientAction, ServerEvent};
pub use error::GameError;
pub use event::GameEvent;
pub use lobby::MAX_NAME_LEN;
pub use model::{Alignment, Player, Power, Role};
pub use narrative::{NarrativeCue, NarrativeRequest};
pub use phase::Phase;
pub use reconnect::JoinOutcome;
pub use rules::Rules;
pub use schedule::{Schedule, Scheduled, TimerPurpose};
pub use snapshot::{
    AccusationView, InvestigationView, PlayerView, Snapshot, TargetLists, TimerView,
};
pub use state::{DayState, Investigation, NightState, RoomState};
pub use theme::{DEFAULT_THEME, Theme};
pub use win::evaluate_winner;
