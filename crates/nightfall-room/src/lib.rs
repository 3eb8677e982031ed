//! Room actors for Nightfall.
//!
//! Each room runs as an isolated Tokio task that owns its
//! [`RoomState`](nightfall_engine::RoomState). Everything that touches a
//! room goes through its [`RoomHandle`], so commands, timer firings and
//! narration results are applied one at a time.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: hosts rooms under short codes, looks them up, reaps
//!   closed ones
//! - [`RoomHandle`]: sends commands to a running room actor
//! - [`RoomOutbound`]: what a room sends to each bound connection
//! - [`Narrator`]: the narrative-text service seam
//! - [`RoomConfig`]: rules and per-room timeouts

mod config;
mod error;
mod manager;
mod narrator;
mod room;
mod timer;

pub use config::RoomConfig;
pub use error::RoomError;
pub use manager::{CODE_LEN, RoomRegistry};
pub use narrator::{CannedNarrator, NarrativeError, Narrator};
pub use room::{RoomHandle, RoomInfo, RoomOutbound, SeatSender};
