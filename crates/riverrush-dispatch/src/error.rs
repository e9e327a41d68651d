//! Error types for the dispatcher.

use riverrush_protocol::EventType;

use crate::HandlerId;

/// Why a handler refused an event.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler rejected the event.
    #[error("{0}")]
    Rejected(String),

    /// A dispatch the handler started itself failed.
    #[error(transparent)]
    Nested(Box<DispatchError>),
}

impl From<DispatchError> for HandlerError {
    fn from(err: DispatchError) -> Self {
        Self::Nested(Box::new(err))
    }
}

/// A dispatch stopped early because a handler failed.
///
/// Handlers after the failing one did not run for this event.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("handler {handler} failed on {event}: {source}")]
    Handler {
        event: EventType,
        handler: HandlerId,
        #[source]
        source: HandlerError,
    },
}
