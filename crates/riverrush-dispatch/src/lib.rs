//! Per-session publish/subscribe bus for River Rush.
//!
//! Components attach handlers keyed by [`EventType`]; [`EventDispatcher::dispatch`]
//! runs every handler currently attached for the event's type, in
//! attachment order, on the calling thread.
//!
//! # Key types
//!
//! - [`EventDispatcher`]: the bus. Cheap to clone; clones share one
//!   registry. Create one per session, never a global.
//! - [`Handler`] / [`handler`]: a shared callback.
//! - [`HandlerId`]: returned by `attach`, used to `detach`.
//! - [`DispatchError`] / [`HandlerError`]: fail-fast dispatch errors.
//!
//! [`EventType`]: riverrush_protocol::EventType

mod dispatcher;
mod error;

pub use dispatcher::{EventDispatcher, Handler, HandlerId, handler};
pub use error::{DispatchError, HandlerError};
