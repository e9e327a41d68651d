//! Handler bookkeeping for the state machines.
//!
//! A state machine never reacts from inside a dispatch. Its handlers only
//! copy the event into the session's [`Inbox`]; the controller drains the
//! inbox after the dispatch returns and feeds each event to the component
//! named by its [`Listener`] tag.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use riverrush_dispatch::{EventDispatcher, Handler, HandlerId, handler};
use riverrush_protocol::{Event, EventType};

/// Which component an inbox entry is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    Game,
    Herd,
}

/// FIFO of events waiting to be handled by a state machine.
#[derive(Debug, Clone, Default)]
pub struct Inbox {
    queue: Arc<Mutex<VecDeque<(Listener, Event)>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, listener: Listener, event: Event) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((listener, event));
    }

    pub fn pop(&self) -> Option<(Listener, Event)> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The handlers one component has attached to a dispatcher.
///
/// Dropping it detaches them, so a component that goes away can never be
/// called again.
#[derive(Debug)]
pub struct Subscriptions {
    dispatcher: EventDispatcher,
    attached: Vec<(EventType, HandlerId)>,
}

impl Subscriptions {
    /// An empty set bound to `dispatcher`.
    pub fn new(dispatcher: &EventDispatcher) -> Self {
        Self {
            dispatcher: dispatcher.clone(),
            attached: Vec::new(),
        }
    }

    /// Attaches one handler per type that forwards events into `inbox`
    /// tagged with `listener`.
    pub fn forward(
        dispatcher: &EventDispatcher,
        types: &[EventType],
        inbox: &Inbox,
        listener: Listener,
    ) -> Self {
        let mut subscriptions = Self::new(dispatcher);
        let inbox = inbox.clone();
        let forwarder = handler(move |event| {
            inbox.push(listener, event.clone());
            Ok(())
        });
        for &event_type in types {
            subscriptions.attach(event_type, Arc::clone(&forwarder));
        }
        subscriptions
    }

    pub fn attach(&mut self, event_type: EventType, handler: Handler) -> HandlerId {
        let id = self.dispatcher.attach(event_type, handler);
        if !self.attached.contains(&(event_type, id)) {
            self.attached.push((event_type, id));
        }
        id
    }

    /// Detaches everything. Returns how many handlers were still attached.
    pub fn dispose(&mut self) -> usize {
        self.attached
            .drain(..)
            .filter(|&(event_type, id)| self.dispatcher.detach(event_type, id))
            .count()
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.dispose();
    }
}
