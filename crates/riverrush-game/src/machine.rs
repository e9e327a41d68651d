//! Driver for the game state machine.
//!
//! Owns the active [`GameState`], its subscriptions and the start
//! countdown, and executes the effects of each [`Step`]. On a phase change
//! the order is fixed:
//!
//! 1. detach the old state's handlers,
//! 2. run the transition's own effects,
//! 3. attach the new state's handlers,
//! 4. run the new state's entry effects.

use riverrush_dispatch::EventDispatcher;
use riverrush_protocol::Event;
use riverrush_timer::{Countdown, Expired, Generation};
use tracing::{debug, info};

use crate::game_state::{Effect, GameContext, GameState, Step};
use crate::subscriptions::{Inbox, Listener, Subscriptions};
use crate::{GameConfig, GameError, GamePhase, TeamRoster};

#[derive(Debug)]
pub struct GameMachine {
    state: GameState,
    subscriptions: Subscriptions,
    dispatcher: EventDispatcher,
    inbox: Inbox,
    countdown: Countdown,
    armed: Option<Generation>,
    config: GameConfig,
    entered: bool,
}

impl GameMachine {
    /// Creates a machine in `Waiting` without entering it. Nothing is
    /// attached or dispatched until [`begin`](Self::begin).
    pub fn new(dispatcher: &EventDispatcher, inbox: &Inbox, config: GameConfig) -> Self {
        Self {
            state: GameState::default(),
            subscriptions: Subscriptions::new(dispatcher),
            dispatcher: dispatcher.clone(),
            inbox: inbox.clone(),
            countdown: Countdown::new(),
            armed: None,
            config,
            entered: false,
        }
    }

    /// Enters the initial state. Calling it again is a no-op.
    pub fn begin(&mut self, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        if self.entered {
            return Ok(self.state);
        }
        self.entered = true;
        info!(phase = %self.state.phase(), "game entered");
        self.enter(roster)?;
        Ok(self.state)
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase()
    }

    /// Starts the game from `Waiting`, cancelling a scheduled start.
    pub fn start(&mut self, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        let step = self.state.start();
        self.apply(step, roster)
    }

    /// Stops a waiting or running game.
    pub fn stop(&mut self, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        let step = self.state.stop();
        self.apply(step, roster)
    }

    /// Ends a running game for good.
    pub fn finish(&mut self, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        let step = self.state.finish();
        self.apply(step, roster)
    }

    /// Reopens a stopped game for players. The start is scheduled right
    /// away if every team already has an animal.
    pub fn wait_for_players(&mut self, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        let step = self.state.wait_for_players();
        self.apply(step, roster)
    }

    /// Feeds an event delivered through the inbox to the active state.
    pub fn handle(&mut self, event: &Event, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        // The event may have been queued before a phase change detached
        // the handler that queued it.
        if !self.state.subscriptions().contains(&event.event_type()) {
            debug!(event = %event.event_type(), phase = %self.phase(), "event no longer subscribed, ignoring");
            return Ok(self.state);
        }
        let step = self.state.react(event, self.context(roster));
        self.apply(step, roster)
    }

    /// Starts the game if `expired` is the countdown armed by this visit to
    /// `Waiting`. Anything else is stale and ignored.
    pub fn on_countdown(&mut self, expired: Expired, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        let current = self.armed.take_if(|g| *g == expired.generation);
        if current.is_none() || self.phase() != GamePhase::Waiting {
            debug!(generation = %expired.generation, phase = %self.phase(), "stale countdown, ignoring");
            return Ok(self.state);
        }
        info!(late_ms = expired.late_by.as_millis() as u64, "start countdown expired");
        self.start(roster)
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn countdown_mut(&mut self) -> &mut Countdown {
        &mut self.countdown
    }

    /// Handlers currently attached by the active state.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn context<'a>(&'a self, roster: &'a dyn TeamRoster) -> GameContext<'a> {
        GameContext {
            roster,
            config: &self.config,
        }
    }

    fn apply(&mut self, step: Step, roster: &dyn TeamRoster) -> Result<GameState, GameError> {
        let from = self.state.phase();
        let changed = step.state.phase() != from;

        if changed {
            let detached = self.subscriptions.dispose();
            debug!(%from, detached, "state handlers detached");
        }
        self.state = step.state;
        let transition = self.run(step.effects);

        // Entry runs even when a transition emit failed; the first error wins.
        let entry = if changed {
            info!(%from, to = %self.state.phase(), "game state changed");
            self.enter(roster)
        } else {
            Ok(())
        };
        transition.and(entry)?;
        Ok(self.state)
    }

    fn enter(&mut self, roster: &dyn TeamRoster) -> Result<(), GameError> {
        self.subscriptions = Subscriptions::forward(
            &self.dispatcher,
            self.state.subscriptions(),
            &self.inbox,
            Listener::Game,
        );
        let step = self.state.enter(self.context(roster));
        self.state = step.state;
        self.run(step.effects)
    }

    /// Runs timer effects first, then every emit in order. An emit that
    /// fails does not stop the ones after it; the first failure is
    /// returned once all of them have run.
    fn run(&mut self, effects: Vec<Effect>) -> Result<(), GameError> {
        let mut emits = Vec::new();
        for effect in effects {
            match effect {
                Effect::Emit(event) => emits.push(event),
                Effect::ArmStart(delay) => {
                    if let Some(generation) = self.countdown.arm(delay) {
                        self.armed = Some(generation);
                    }
                }
                Effect::CancelStart => {
                    self.armed = None;
                    self.countdown.cancel();
                }
            }
        }

        let mut first_error = None;
        for event in emits {
            if let Err(e) = self.dispatcher.dispatch(&event) {
                debug!(event = %event.event_type(), error = %e, "state announcement failed");
                first_error.get_or_insert(GameError::from(e));
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
