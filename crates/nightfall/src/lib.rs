//! # Nightfall
//!
//! A real-time social-deduction game server. One shared screen hosts a
//! room; every player joins from a phone. The server owns the whole game:
//! phases, roles, votes, timers and narration.
//!
//! ```text
//! WebSocket ─→ handler ─→ SessionManager (tokens, grace)
//!                 │
//!                 └─→ RoomRegistry ─→ room actor ─→ RoomState (engine)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nightfall::{CannedNarrator, NightfallServerBuilder};
//!
//! # async fn serve() -> Result<(), nightfall::NightfallError> {
//! let server = NightfallServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(CannedNarrator)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, DEFAULT_BIND_ADDRESS, DEFAULT_IDLE_TIMEOUT_SECONDS, ServerConfig};
pub use error::NightfallError;
pub use server::{NightfallServer, NightfallServerBuilder};

pub use nightfall_engine::{ClientAction, Rules, ServerEvent};
pub use nightfall_protocol::{Envelope, PROTOCOL_VERSION, Payload, PlayerId, RoomCode, Seat, SystemMessage};
pub use nightfall_room::{CannedNarrator, NarrativeError, Narrator, RoomConfig};
pub use nightfall_session::SessionConfig;
