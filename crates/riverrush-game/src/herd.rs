//! The animals of a session and their state machines.

use std::collections::BTreeMap;

use riverrush_dispatch::EventDispatcher;
use riverrush_protocol::{AnimalId, Event, EventType, TeamId};
use tracing::{debug, warn};

use crate::animal_state::{AnimalEffect, AnimalState, AnimalStep};
use crate::subscriptions::{Inbox, Listener, Subscriptions};
use crate::GameError;

/// Presentation hooks for animal reactions that have no network
/// counterpart, such as a hit animation.
pub trait Presentation: Send + 'static {
    fn animal_hit(&mut self, animal: AnimalId, team: TeamId);
}

/// Presentation that does nothing. Used by headless sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresentation;

impl Presentation for NoPresentation {
    fn animal_hit(&mut self, _animal: AnimalId, _team: TeamId) {}
}

/// One animal in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Animal {
    pub id: AnimalId,
    pub team: TeamId,
    pub state: AnimalState,
}

/// Owns every animal's state and routes animal events to them.
///
/// The herd listens for animal events only while it has animals.
pub struct Herd {
    animals: BTreeMap<AnimalId, Animal>,
    subscriptions: Subscriptions,
    dispatcher: EventDispatcher,
    inbox: Inbox,
    presentation: Box<dyn Presentation>,
}

impl Herd {
    /// Events that drive animal transitions.
    pub const COMMANDS: [EventType; 3] = [
        EventType::PlayerJumped,
        EventType::AnimalDropped,
        EventType::AnimalCollided,
    ];

    pub fn new(dispatcher: &EventDispatcher, inbox: &Inbox, presentation: Box<dyn Presentation>) -> Self {
        Self {
            animals: BTreeMap::new(),
            subscriptions: Subscriptions::new(dispatcher),
            dispatcher: dispatcher.clone(),
            inbox: inbox.clone(),
            presentation,
        }
    }

    /// Adds an animal standing on its boat.
    pub fn spawn(&mut self, id: AnimalId, team: TeamId) -> Result<(), GameError> {
        if self.animals.contains_key(&id) {
            return Err(GameError::DuplicateAnimal(id));
        }
        if self.animals.is_empty() {
            self.subscriptions =
                Subscriptions::forward(&self.dispatcher, &Self::COMMANDS, &self.inbox, Listener::Herd);
        }
        self.animals.insert(
            id,
            Animal {
                id,
                team,
                state: AnimalState::default(),
            },
        );
        Ok(())
    }

    pub fn despawn(&mut self, id: AnimalId) -> Result<Animal, GameError> {
        let animal = self.animals.remove(&id).ok_or(GameError::UnknownAnimal(id))?;
        if self.animals.is_empty() {
            self.subscriptions.dispose();
        }
        Ok(animal)
    }

    pub fn get(&self, id: AnimalId) -> Option<&Animal> {
        self.animals.get(&id)
    }

    pub fn state_of(&self, id: AnimalId) -> Option<AnimalState> {
        self.animals.get(&id).map(|a| a.state)
    }

    pub fn len(&self) -> usize {
        self.animals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animals.is_empty()
    }

    /// Handlers currently attached by the herd.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn jump(&mut self, id: AnimalId) -> Result<AnimalState, GameError> {
        self.apply(id, AnimalState::jump)
    }

    pub fn drop_down(&mut self, id: AnimalId) -> Result<AnimalState, GameError> {
        self.apply(id, AnimalState::drop)
    }

    pub fn collide(&mut self, id: AnimalId) -> Result<AnimalState, GameError> {
        self.apply(id, AnimalState::collide)
    }

    pub fn return_to_boat(&mut self, id: AnimalId) -> Result<AnimalState, GameError> {
        self.apply(id, AnimalState::return_to_boat)
    }

    /// Feeds an event delivered through the inbox to its animal.
    ///
    /// Events for animals that are not in the herd come from the network
    /// and are dropped with a warning.
    pub fn handle(&mut self, event: &Event) -> Result<(), GameError> {
        let Some(id) = event.animal() else {
            return Ok(());
        };
        let result = match event {
            Event::PlayerJumped { .. } => self.jump(id),
            Event::AnimalDropped { .. } => self.drop_down(id),
            Event::AnimalCollided { .. } => self.collide(id),
            _ => return Ok(()),
        };
        match result {
            Ok(_) => Ok(()),
            Err(GameError::UnknownAnimal(id)) => {
                warn!(animal = %id, event = %event.event_type(), "event for unknown animal, ignoring");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn apply(
        &mut self,
        id: AnimalId,
        transition: fn(AnimalState, AnimalId) -> AnimalStep,
    ) -> Result<AnimalState, GameError> {
        let animal = self.animals.get_mut(&id).ok_or(GameError::UnknownAnimal(id))?;
        let from = animal.state;
        let step = transition(from, id);
        animal.state = step.state;
        let team = animal.team;
        if from != step.state {
            debug!(animal = %id, %from, to = %step.state, "animal state changed");
        }

        for effect in step.effects {
            match effect {
                AnimalEffect::Hit => self.presentation.animal_hit(id, team),
                AnimalEffect::Emit(event) => self.dispatcher.dispatch(&event)?,
            }
        }
        Ok(step.state)
    }
}

impl std::fmt::Debug for Herd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Herd")
            .field("animals", &self.animals)
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}
