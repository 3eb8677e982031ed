//! Wire protocol for Nightfall.
//!
//! This crate defines the messages that clients and the server exchange:
//!
//! - **Types** ([`Envelope`], [`SystemMessage`], [`RoomCode`], [`Seat`]):
//!   the structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages
//!   are converted to and from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong while encoding,
//!   decoding, or validating a message.
//!
//! The protocol layer knows nothing about connections or rooms. Game
//! actions travel as opaque bytes inside [`Payload::Game`]; their shape is
//! owned by `nightfall-engine`.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Session (seat) → Room (game)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Envelope, PROTOCOL_VERSION, Payload, PlayerId, RoomCode, Seat,
    SystemMessage,
};
