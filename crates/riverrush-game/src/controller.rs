//! The synchronous core of one session.
//!
//! The [`Controller`] wires everything a session owns to one dispatcher:
//! the roster, the game machine, the herd and the outbound relay to
//! connected clients. Every input (a raw network line, a roster change, a
//! lifecycle call, a countdown expiry) is dispatched and then the inbox is
//! drained until no reaction is left, so the caller always sees a settled
//! session when a call returns.
//!
//! It does no I/O and spawns nothing; the session actor drives it from a
//! single task.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use riverrush_dispatch::{EventDispatcher, HandlerError, handler};
use riverrush_protocol::{AnimalId, ClientId, Codec, Event, EventType, SessionId, TeamId};
use riverrush_timer::{Countdown, Expired};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::animal_state::AnimalState;
use crate::herd::{Herd, Presentation};
use crate::machine::GameMachine;
use crate::subscriptions::{Inbox, Listener, Subscriptions};
use crate::{GameConfig, GameError, GamePhase, GameState, Roster};

/// Channel for delivering encoded outbound lines to one client.
pub type ClientSender = mpsc::UnboundedSender<String>;

type Clients = Arc<Mutex<BTreeMap<ClientId, ClientSender>>>;

/// Upper bound on follow-up events processed for a single input.
pub const MAX_REACTIONS: usize = 1024;

pub struct Controller<C: Codec> {
    session_id: SessionId,
    codec: Arc<C>,
    dispatcher: EventDispatcher,
    inbox: Inbox,
    roster: Roster,
    machine: GameMachine,
    herd: Herd,
    clients: Clients,
    relay: Subscriptions,
}

impl<C: Codec> Controller<C> {
    /// Builds a session core. Nothing is dispatched until
    /// [`open`](Self::open), so collaborators can attach first.
    pub fn new(
        session_id: SessionId,
        config: GameConfig,
        codec: Arc<C>,
        presentation: Box<dyn Presentation>,
    ) -> Self {
        let dispatcher = EventDispatcher::new();
        let inbox = Inbox::new();
        let clients: Clients = Arc::default();
        let relay = relay(&dispatcher, Arc::clone(&codec), Arc::clone(&clients), session_id);

        Self {
            session_id,
            codec,
            roster: Roster::new(config.teams, config.max_animals_per_team),
            machine: GameMachine::new(&dispatcher, &inbox, config),
            herd: Herd::new(&dispatcher, &inbox, presentation),
            dispatcher,
            inbox,
            clients,
            relay,
        }
    }

    /// Enters the initial `Waiting` state.
    pub fn open(&mut self) -> Result<GamePhase, GameError> {
        let entered = self.machine.begin(&self.roster);
        self.settle_after(entered)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The session's dispatcher, for presentation components that want to
    /// observe or inject events.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    pub fn state(&self) -> GameState {
        self.machine.state()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn animal_state(&self, animal: AnimalId) -> Option<AnimalState> {
        self.herd.state_of(animal)
    }

    pub fn countdown(&self) -> &Countdown {
        self.machine.countdown()
    }

    pub fn countdown_mut(&mut self) -> &mut Countdown {
        self.machine.countdown_mut()
    }

    /// Handlers attached by the game machine and the herd, not counting
    /// the relay or outside observers.
    pub fn state_handler_count(&self) -> usize {
        self.machine.subscription_count() + self.herd.subscription_count()
    }

    // -----------------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------------

    /// Decodes a line from a trusted source and publishes it. Any event
    /// type is accepted.
    pub fn on_message(&mut self, raw: &str) -> Result<GamePhase, GameError> {
        let event = self.codec.decode(raw)?;
        self.publish(event)
    }

    /// Decodes a line sent by `client` and publishes it.
    ///
    /// Only client commands are accepted; notifications the session
    /// produces itself are rejected with [`GameError::NotAClientCommand`].
    /// A `RenderJoin` is answered with a snapshot of the session before it
    /// is published.
    pub fn on_client_message(&mut self, client: ClientId, raw: &str) -> Result<GamePhase, GameError> {
        let event = self.codec.decode(raw)?;
        let event_type = event.event_type();
        if !event_type.is_client_command() {
            return Err(GameError::NotAClientCommand(client, event_type));
        }
        if event_type == EventType::RenderJoin {
            self.send_snapshot(client)?;
        }
        self.publish(event)
    }

    /// Dispatches `event` and lets every state react to it.
    ///
    /// The session is settled even when a handler fails; the dispatch
    /// error is returned afterwards.
    pub fn publish(&mut self, event: Event) -> Result<GamePhase, GameError> {
        debug!(session_id = %self.session_id, event = %event.event_type(), "publishing");
        let dispatched = self.dispatcher.dispatch(&event);
        self.settle_after(dispatched)
    }

    /// Adds an animal to `team`, or to the smallest team when `None`.
    ///
    /// Once the roster accepts the animal it stays: a handler failing on
    /// the `AnimalAdded` that follows is reported, but the animal is
    /// placed and the session settled.
    pub fn add_animal(&mut self, animal: AnimalId, team: Option<TeamId>) -> Result<TeamId, GameError> {
        let team = match team {
            Some(team) => team,
            None => self.roster.smallest_team()?,
        };
        self.roster.add(animal, team)?;
        if let Err(e) = self.herd.spawn(animal, team) {
            let _ = self.roster.remove(animal);
            return Err(e);
        }
        info!(session_id = %self.session_id, %animal, %team, "animal added");
        self.publish(Event::AnimalAdded { animal, team })?;
        Ok(team)
    }

    /// Removes an animal. As with [`add_animal`](Self::add_animal), a
    /// failing handler does not put it back.
    pub fn remove_animal(&mut self, animal: AnimalId) -> Result<TeamId, GameError> {
        let team = self.roster.remove(animal)?;
        self.herd.despawn(animal)?;
        info!(session_id = %self.session_id, %animal, %team, "animal removed");
        self.publish(Event::AnimalRemoved { animal, team })?;
        Ok(team)
    }

    /// Puts an animal that fell into the water back on its boat.
    pub fn return_to_boat(&mut self, animal: AnimalId) -> Result<AnimalState, GameError> {
        let returned = self.herd.return_to_boat(animal);
        let settled = self.settle();
        let state = returned?;
        settled?;
        Ok(state)
    }

    pub fn start(&mut self) -> Result<GamePhase, GameError> {
        let result = self.machine.start(&self.roster);
        self.settle_after(result)
    }

    pub fn stop(&mut self) -> Result<GamePhase, GameError> {
        let result = self.machine.stop(&self.roster);
        self.settle_after(result)
    }

    pub fn finish(&mut self) -> Result<GamePhase, GameError> {
        let result = self.machine.finish(&self.roster);
        self.settle_after(result)
    }

    pub fn wait_for_players(&mut self) -> Result<GamePhase, GameError> {
        let result = self.machine.wait_for_players(&self.roster);
        self.settle_after(result)
    }

    /// Handles an expiry reported by [`Countdown::wait`].
    pub fn on_countdown(&mut self, expired: Expired) -> Result<GamePhase, GameError> {
        let result = self.machine.on_countdown(expired, &self.roster);
        self.settle_after(result)
    }

    /// Reactions queued but not yet processed. Zero whenever a call on the
    /// controller has returned.
    pub fn pending_reactions(&self) -> usize {
        self.inbox.len()
    }

    // -----------------------------------------------------------------------
    // Clients
    // -----------------------------------------------------------------------

    /// Registers an outbound channel and sends it the current phase.
    pub fn connect(&mut self, client: ClientId, sender: ClientSender) -> Result<(), GameError> {
        let line = self.codec.encode(&self.phase().entered_event())?;
        let _ = sender.send(line);
        self.lock_clients().insert(client, sender);
        info!(session_id = %self.session_id, %client, "client connected");
        Ok(())
    }

    /// Returns `true` if the client was connected.
    pub fn disconnect(&mut self, client: ClientId) -> bool {
        let removed = self.lock_clients().remove(&client).is_some();
        if removed {
            info!(session_id = %self.session_id, %client, "client disconnected");
        }
        removed
    }

    pub fn client_count(&self) -> usize {
        self.lock_clients().len()
    }

    /// Closes every client channel and detaches all handlers.
    pub fn shutdown(&mut self) {
        self.relay.dispose();
        self.lock_clients().clear();
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Settles the session whatever `outcome` was, then reports the first
    /// error.
    fn settle_after<T, E>(&mut self, outcome: Result<T, E>) -> Result<GamePhase, GameError>
    where
        E: Into<GameError>,
    {
        let settled = self.settle();
        if let Err(e) = outcome {
            return Err(e.into());
        }
        settled
    }

    /// Drains the inbox, feeding each event to its listener.
    ///
    /// A listener failing on one event does not stop the rest from being
    /// processed; the first failure is returned once the inbox is empty.
    fn settle(&mut self) -> Result<GamePhase, GameError> {
        let mut processed = 0;
        let mut first_error = None;
        while let Some((listener, event)) = self.inbox.pop() {
            processed += 1;
            if processed > MAX_REACTIONS {
                while self.inbox.pop().is_some() {}
                return Err(GameError::ReactionOverflow(MAX_REACTIONS));
            }
            let reacted = match listener {
                Listener::Game => self.machine.handle(&event, &self.roster).map(|_| ()),
                Listener::Herd => self.herd.handle(&event),
            };
            if let Err(e) = reacted {
                warn!(session_id = %self.session_id, event = %event.event_type(), error = %e, "reaction failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(self.phase()),
        }
    }

    /// Sends the phase and the roster to one client.
    fn send_snapshot(&self, client: ClientId) -> Result<(), GameError> {
        let clients = self.lock_clients();
        let Some(sender) = clients.get(&client) else {
            return Err(GameError::ClientNotInSession(client));
        };
        let mut events = vec![self.phase().entered_event()];
        for team in self.roster.teams() {
            events.extend(
                self.roster
                    .animals(team)
                    .map(|animal| Event::AnimalAdded { animal, team }),
            );
        }
        for event in &events {
            let _ = sender.send(self.codec.encode(event)?);
        }
        debug!(session_id = %self.session_id, %client, events = events.len(), "snapshot sent");
        Ok(())
    }

    fn lock_clients(&self) -> std::sync::MutexGuard<'_, BTreeMap<ClientId, ClientSender>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: Codec> std::fmt::Debug for Controller<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase())
            .field("animals", &self.roster.animal_count())
            .field("clients", &self.client_count())
            .finish()
    }
}

/// Attaches one handler per broadcast type that encodes the event and
/// sends it to every connected client.
fn relay<C: Codec>(
    dispatcher: &EventDispatcher,
    codec: Arc<C>,
    clients: Clients,
    session_id: SessionId,
) -> Subscriptions {
    let mut subscriptions = Subscriptions::new(dispatcher);
    let broadcast = handler(move |event| {
        let line = codec
            .encode(event)
            .map_err(|e| HandlerError::Rejected(e.to_string()))?;
        let mut clients = clients.lock().unwrap_or_else(PoisonError::into_inner);
        clients.retain(|client, sender| {
            let open = sender.send(line.clone()).is_ok();
            if !open {
                warn!(%session_id, %client, "client channel closed, dropping");
            }
            open
        });
        Ok(())
    });
    for event_type in EventType::ALL.into_iter().filter(|t| t.is_broadcast()) {
        subscriptions.attach(event_type, Arc::clone(&broadcast));
    }
    subscriptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::herd::NoPresentation;
    use riverrush_protocol::Protocol;

    fn controller() -> Controller<Protocol> {
        let mut controller = Controller::new(
            SessionId(1),
            GameConfig::default(),
            Arc::new(Protocol::standard()),
            Box::new(NoPresentation),
        );
        controller.open().unwrap();
        controller
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_open_enters_waiting_once() {
        let mut controller = controller();
        assert_eq!(controller.phase(), GamePhase::Waiting);
        assert_eq!(controller.open().unwrap(), GamePhase::Waiting);
        assert_eq!(controller.countdown().metrics().armed, 0);
    }

    #[test]
    fn test_connect_sends_current_phase() {
        let mut controller = controller();
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.connect(ClientId(1), tx).unwrap();
        assert_eq!(drain(&mut rx), vec!["type=GameWaiting;"]);
        assert_eq!(controller.client_count(), 1);
    }

    #[test]
    fn test_relay_skips_non_broadcast_events() {
        let mut controller = controller();
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.connect(ClientId(1), tx).unwrap();
        drain(&mut rx);

        controller.publish(Event::RenderJoin).unwrap();
        controller
            .publish(Event::AddObstacle {
                team: TeamId(1),
                location: 0.5,
            })
            .unwrap();

        assert_eq!(drain(&mut rx), vec!["team=1;location=0.5;type=AddObstacle;"]);
    }

    #[test]
    fn test_closed_client_is_dropped_on_broadcast() {
        let mut controller = controller();
        let (tx, rx) = mpsc::unbounded_channel();
        controller.connect(ClientId(1), tx).unwrap();
        drop(rx);

        controller.publish(Event::GameWaiting).unwrap();
        assert_eq!(controller.client_count(), 0);
    }

    #[test]
    fn test_render_join_gets_snapshot() {
        let mut controller = controller();
        controller.add_animal(AnimalId(4), Some(TeamId(1))).unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        controller.connect(ClientId(2), tx).unwrap();
        drain(&mut rx);

        controller.on_client_message(ClientId(2), "type=RenderJoin;").unwrap();

        assert_eq!(
            drain(&mut rx),
            vec!["type=GameWaiting;", "animal=4;team=1;type=AnimalAdded;"]
        );
    }

    #[test]
    fn test_clients_cannot_send_session_notifications() {
        let mut controller = controller();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        controller.connect(ClientId(1), tx1).unwrap();
        controller.connect(ClientId(2), tx2).unwrap();
        drain(&mut rx2);

        for raw in ["type=GameFinished;", "animal=77;type=AnimalFellOff;"] {
            let err = controller.on_client_message(ClientId(1), raw).unwrap_err();
            assert!(matches!(err, GameError::NotAClientCommand(ClientId(1), _)), "{raw} accepted");
        }

        assert_eq!(controller.phase(), GamePhase::Waiting);
        assert!(drain(&mut rx2).is_empty());

        controller.on_client_message(ClientId(1), "team=0;location=0.5;type=AddObstacle;").unwrap();
        assert_eq!(drain(&mut rx2), vec!["team=0;location=0.5;type=AddObstacle;"]);
    }

    #[test]
    fn test_add_animal_defaults_to_smallest_team() {
        let mut controller = controller();
        assert_eq!(controller.add_animal(AnimalId(1), None).unwrap(), TeamId(0));
        assert_eq!(controller.add_animal(AnimalId(2), None).unwrap(), TeamId(1));
        assert!(matches!(
            controller.add_animal(AnimalId(1), None),
            Err(GameError::DuplicateAnimal(_))
        ));
        assert_eq!(controller.roster().animal_count(), 2);
    }

    #[test]
    fn test_malformed_message_is_an_error_and_changes_nothing() {
        let mut controller = controller();
        let err = controller.on_message("garbage").unwrap_err();
        assert!(matches!(err, GameError::Protocol(_)));
        assert_eq!(controller.phase(), GamePhase::Waiting);
    }
}
