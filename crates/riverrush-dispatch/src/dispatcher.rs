//! The event dispatcher.
//!
//! Handlers are stored per [`EventType`] in attachment order. `dispatch`
//! copies the handler list for the event's type, releases the registry
//! lock, and only then calls the handlers. That is what makes it safe for
//! a handler to attach, detach or dispatch again while a dispatch is in
//! progress: nobody holds the lock while user code runs.
//!
//! Semantics of mutation during a dispatch:
//! - a handler detached by an earlier handler of the same dispatch does
//!   not run;
//! - a handler attached during a dispatch first runs on the next one;
//! - a nested `dispatch` runs to completion before the outer one resumes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use riverrush_protocol::{Event, EventType};

use crate::{DispatchError, HandlerError};

/// A shared event callback.
///
/// The component that attaches a handler keeps owning it (and its
/// [`HandlerId`]); the dispatcher only holds another reference.
pub type Handler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// Wraps a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Identifies one attachment, returned by [`EventDispatcher::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H-{}", self.0)
    }
}

struct Entry {
    id: HandlerId,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<EventType, Vec<Entry>>,
}

/// A synchronous publish/subscribe bus keyed by event type.
///
/// Clones share the same registry, so a session can hand a clone to every
/// component that needs to attach or dispatch.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    registry: Arc<Mutex<Registry>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `handler` for every future dispatch of `event_type`.
    ///
    /// Attaching the same handler (the same `Arc`) twice for the same type
    /// does not register it twice: the existing id is returned and the
    /// handler keeps running once per dispatch.
    pub fn attach(&self, event_type: EventType, handler: Handler) -> HandlerId {
        let mut guard = self.lock();
        let registry = &mut *guard;
        let entries = registry.handlers.entry(event_type).or_default();

        if let Some(existing) = entries.iter().find(|e| same_handler(&e.handler, &handler)) {
            tracing::debug!(event = %event_type, handler = %existing.id, "handler already attached");
            return existing.id;
        }

        registry.next_id += 1;
        let id = HandlerId(registry.next_id);
        entries.push(Entry { id, handler });
        tracing::trace!(event = %event_type, handler = %id, "handler attached");
        id
    }

    /// Detaches a handler. Detaching one that is not attached is a no-op.
    ///
    /// Returns `true` if the handler was attached.
    pub fn detach(&self, event_type: EventType, id: HandlerId) -> bool {
        let mut registry = self.lock();
        let Some(entries) = registry.handlers.get_mut(&event_type) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            registry.handlers.remove(&event_type);
        }
        if removed {
            tracing::trace!(event = %event_type, handler = %id, "handler detached");
        }
        removed
    }

    /// Runs every handler attached for the event's type, in attachment
    /// order, on the calling thread.
    ///
    /// # Errors
    /// Stops at the first failing handler and returns
    /// [`DispatchError::Handler`]; the remaining handlers do not run.
    pub fn dispatch(&self, event: &Event) -> Result<(), DispatchError> {
        let event_type = event.event_type();
        let snapshot: Vec<(HandlerId, Handler)> = self
            .lock()
            .handlers
            .get(&event_type)
            .map(|entries| {
                entries
                    .iter()
                    .map(|e| (e.id, Arc::clone(&e.handler)))
                    .collect()
            })
            .unwrap_or_default();

        tracing::trace!(event = %event_type, handlers = snapshot.len(), "dispatching");

        for (id, handler) in snapshot {
            if !self.is_attached(event_type, id) {
                continue;
            }
            handler(event).map_err(|source| DispatchError::Handler {
                event: event_type,
                handler: id,
                source,
            })?;
        }
        Ok(())
    }

    /// Returns `true` if `id` is currently attached for `event_type`.
    pub fn is_attached(&self, event_type: EventType, id: HandlerId) -> bool {
        self.lock()
            .handlers
            .get(&event_type)
            .is_some_and(|entries| entries.iter().any(|e| e.id == id))
    }

    /// Number of handlers attached for `event_type`.
    pub fn handler_count(&self, event_type: EventType) -> usize {
        self.lock().handlers.get(&event_type).map_or(0, Vec::len)
    }

    /// Number of handlers attached across all types.
    pub fn total_handlers(&self) -> usize {
        self.lock().handlers.values().map(Vec::len).sum()
    }

    /// A poisoned lock only means a panic happened elsewhere while the
    /// registry was held; the registry itself is always left consistent.
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.lock();
        let mut counts: Vec<_> = registry
            .handlers
            .iter()
            .map(|(ty, entries)| (*ty, entries.len()))
            .collect();
        counts.sort();
        f.debug_struct("EventDispatcher")
            .field("handlers", &counts)
            .finish()
    }
}

/// Compares the data pointers only; vtable pointers of the same closure
/// may differ across codegen units.
fn same_handler(a: &Handler, b: &Handler) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
