//! Unified error type for River Rush.

use riverrush_dispatch::DispatchError;
use riverrush_game::GameError;
use riverrush_protocol::ProtocolError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RiverrushError {
    /// Malformed wire text, unknown event type, or invalid config.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A handler failed during dispatch.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A session-level error (roster, lookup, unavailable actor).
    #[error(transparent)]
    Game(#[from] GameError),
}
