//! # River Rush
//!
//! Event-driven synchronization core for River Rush, a party game where
//! teams of animals ride boats down a river and jump over obstacles.
//!
//! Clients speak a line-oriented text protocol (`animal=3;type=JumpCommand;`).
//! Each game session decodes those lines into events, publishes them on
//! its own dispatcher, lets the game and animal state machines react, and
//! relays the resulting notifications back to every connected client.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use riverrush::prelude::*;
//!
//! # async fn run() -> Result<(), RiverrushError> {
//! riverrush::logging::init();
//! let mut sessions = Riverrush::builder().build()?;
//! let session = sessions.create_session();
//! let handle = sessions.get(session).cloned().ok_or(GameError::SessionNotFound(session))?;
//! handle.add_animal(AnimalId(1), None).await?;
//! handle.add_animal(AnimalId(2), None).await?;
//! // The game starts on its own five seconds later.
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
pub mod logging;

pub use builder::{Riverrush, RiverrushBuilder};
pub use error::RiverrushError;

pub use riverrush_dispatch as dispatch;
pub use riverrush_game as game;
pub use riverrush_protocol as protocol;
pub use riverrush_timer as timer;

/// Everything a host needs to run sessions.
pub mod prelude {
    pub use crate::{Riverrush, RiverrushBuilder, RiverrushError};
    pub use riverrush_dispatch::{DispatchError, EventDispatcher, Handler, HandlerError, handler};
    pub use riverrush_game::{
        AnimalState, ClientSender, Controller, GameConfig, GameError, GamePhase, NoPresentation,
        Presentation, SessionHandle, SessionInfo, SessionManager,
    };
    pub use riverrush_protocol::{
        AnimalId, ClientId, Codec, Event, EventType, Protocol, ProtocolConfig, ProtocolError,
        SessionId, TeamId,
    };
}
