//! Game layer for River Rush.
//!
//! Each session runs as an isolated Tokio task (actor model) that owns a
//! roster, the game state machine, one state machine per animal and its
//! own event dispatcher.
//!
//! # Key types
//!
//! - [`GameState`] / [`AnimalState`]: pure transition functions
//! - [`GameMachine`] / [`Herd`]: execute transitions and own handlers
//! - [`Controller`]: synchronous core of one session
//! - [`SessionHandle`]: send commands to a running session actor
//! - [`SessionManager`]: creates/destroys sessions, routes clients
//! - [`GameConfig`]: start delay, team count and limits

mod animal_state;
mod config;
mod controller;
mod error;
mod game_state;
mod herd;
mod machine;
mod manager;
mod roster;
mod session;
mod subscriptions;

pub use animal_state::{AnimalEffect, AnimalState, AnimalStep};
pub use config::{GameConfig, GamePhase};
pub use controller::{ClientSender, Controller, MAX_REACTIONS};
pub use error::GameError;
pub use game_state::{Effect, GameContext, GameState, Step};
pub use herd::{Animal, Herd, NoPresentation, Presentation};
pub use machine::GameMachine;
pub use manager::SessionManager;
pub use roster::{Roster, TeamRoster};
pub use session::{SessionHandle, SessionInfo, Transition, spawn_session};
pub use subscriptions::{Inbox, Listener, Subscriptions};
