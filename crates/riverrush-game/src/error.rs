//! Error types for the game layer.

use riverrush_dispatch::DispatchError;
use riverrush_protocol::{AnimalId, ClientId, EventType, ProtocolError, SessionId, TeamId};

/// Errors that can occur while driving a session.
///
/// A session is the unit of failure containment: none of these take the
/// process down, the session actor logs them and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// An incoming message could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A handler failed while an event was being dispatched.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A client sent an event only the session may produce.
    #[error("client {0} may not send {1}")]
    NotAClientCommand(ClientId, EventType),

    /// The team does not exist in this session.
    #[error("team {0} not found")]
    UnknownTeam(TeamId),

    /// The team has no free slot.
    #[error("team {0} is full")]
    TeamFull(TeamId),

    /// The animal is already part of the session.
    #[error("animal {0} already in session")]
    DuplicateAnimal(AnimalId),

    /// The animal is not part of the session.
    #[error("animal {0} not found")]
    UnknownAnimal(AnimalId),

    /// The session has no teams to put animals in.
    #[error("session has no teams")]
    NoTeams,

    /// Reacting to one input produced more follow-up events than allowed,
    /// which means two reactions keep triggering each other.
    #[error("reaction limit of {0} events exceeded")]
    ReactionOverflow(usize),

    /// The session does not exist.
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    /// The client is not connected to any session.
    #[error("client {0} is not in a session")]
    ClientNotInSession(ClientId),

    /// The client is already connected to a session.
    #[error("client {0} already in session {1}")]
    AlreadyInSession(ClientId, SessionId),

    /// The session's command channel is full or closed.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),
}
