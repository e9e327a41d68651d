//! Wire protocol for River Rush.
//!
//! This crate defines what the game talks about and how it is written on
//! the wire:
//!
//! - **Ids** ([`AnimalId`], [`TeamId`], [`SessionId`], [`ClientId`]).
//! - **Events** ([`Event`], [`EventType`]): every notification, each
//!   able to render and parse its own fields.
//! - **Codecs** ([`Protocol`], [`JsonCodec`], the [`Codec`] trait):
//!   line text such as `animal=3;type=JumpCommand;` and its JSON twin.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sessions, dispatchers or
//! sockets. The transport hands it a line, it hands back an [`Event`].
//!
//! ```text
//! Transport (text line) → Protocol (Event) → Dispatcher (handlers)
//! ```

mod codec;
mod error;
mod event;
mod types;

pub use codec::{Codec, EventFactory, Protocol, ProtocolConfig};
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{Event, EventType, Fields};
pub use types::{AnimalId, ClientId, SessionId, TeamId};
