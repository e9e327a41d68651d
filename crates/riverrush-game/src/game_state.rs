//! The game state machine.
//!
//! Transitions are pure: each one consumes the current state and returns a
//! [`Step`] holding the next state and the side effects to perform. The
//! caller ([`GameMachine`](crate::GameMachine)) executes those effects and
//! owns the handler subscriptions, so nothing here touches a dispatcher or
//! a timer.
//!
//! Operations that make no sense in the current state (starting a game
//! that is already playing, finishing one that is still waiting) return
//! the state unchanged with no effects.

use std::time::Duration;

use riverrush_protocol::{Event, EventType};

use crate::{GameConfig, GamePhase, TeamRoster};

/// What a state needs to look at when it reacts.
#[derive(Clone, Copy)]
pub struct GameContext<'a> {
    pub roster: &'a dyn TeamRoster,
    pub config: &'a GameConfig,
}

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Dispatch this event on the session's dispatcher.
    Emit(Event),
    /// Arm the start countdown.
    ArmStart(Duration),
    /// Cancel the start countdown if it is armed.
    CancelStart,
}

/// Result of a transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: GameState,
    pub effects: Vec<Effect>,
}

impl Step {
    fn stay(state: GameState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn to(state: GameState, effects: Vec<Effect>) -> Self {
        Self { state, effects }
    }
}

/// The active game state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    /// Waiting for every team to have an animal. `start_armed` is set once
    /// the automatic start has been scheduled, so it is scheduled at most
    /// once per visit.
    Waiting { start_armed: bool },
    Playing,
    Stopped,
    Finished,
}

impl Default for GameState {
    fn default() -> Self {
        Self::Waiting { start_armed: false }
    }
}

impl GameState {
    pub fn phase(&self) -> GamePhase {
        match self {
            Self::Waiting { .. } => GamePhase::Waiting,
            Self::Playing => GamePhase::Playing,
            Self::Stopped => GamePhase::Stopped,
            Self::Finished => GamePhase::Finished,
        }
    }

    /// Event types this state reacts to while it is active.
    pub fn subscriptions(&self) -> &'static [EventType] {
        match self {
            Self::Waiting { .. } => &[EventType::AnimalAdded, EventType::AnimalRemoved],
            Self::Playing => &[EventType::JumpCommand],
            Self::Stopped | Self::Finished => &[],
        }
    }

    /// Entry actions, run after the state's subscriptions are attached.
    pub fn enter(self, ctx: GameContext<'_>) -> Step {
        let announce = Effect::Emit(self.phase().entered_event());
        match self {
            Self::Waiting { .. } => {
                // Animals may already be present when coming back from
                // Stopped, so check once without waiting for a new one.
                let mut step = self.check_roster(ctx);
                step.effects.insert(0, announce);
                step
            }
            _ => Step::to(self, vec![announce]),
        }
    }

    /// `Waiting` moves to `Playing` and cancels the scheduled start.
    /// Every other state stays.
    pub fn start(self) -> Step {
        match self {
            Self::Waiting { .. } => Step::to(Self::Playing, vec![Effect::CancelStart]),
            _ => Step::stay(self),
        }
    }

    /// `Waiting` and `Playing` move to `Stopped`; leaving `Waiting` cancels
    /// the scheduled start.
    pub fn stop(self) -> Step {
        match self {
            Self::Waiting { .. } => Step::to(Self::Stopped, vec![Effect::CancelStart]),
            Self::Playing => Step::to(Self::Stopped, Vec::new()),
            _ => Step::stay(self),
        }
    }

    /// Only a `Playing` game can finish. `Finished` is terminal.
    pub fn finish(self) -> Step {
        match self {
            Self::Playing => Step::to(Self::Finished, Vec::new()),
            _ => Step::stay(self),
        }
    }

    /// `Stopped` goes back to `Waiting` with nothing scheduled; entering
    /// `Waiting` checks the roster again.
    pub fn wait_for_players(self) -> Step {
        match self {
            Self::Stopped => Step::to(Self::default(), Vec::new()),
            _ => Step::stay(self),
        }
    }

    /// Reacts to a subscribed event.
    pub fn react(self, event: &Event, ctx: GameContext<'_>) -> Step {
        match (self, event) {
            (Self::Waiting { start_armed: false }, Event::AnimalAdded { .. }) => {
                self.check_roster(ctx)
            }
            (Self::Waiting { start_armed: true }, Event::AnimalRemoved { .. })
                if !ctx.roster.has_enough_animals() =>
            {
                Step::to(
                    Self::default(),
                    vec![Effect::CancelStart, Effect::Emit(Event::GameWaiting)],
                )
            }
            (Self::Playing, Event::JumpCommand { animal }) => Step::to(
                self,
                vec![Effect::Emit(Event::PlayerJumped { animal: *animal })],
            ),
            _ => Step::stay(self),
        }
    }

    /// Schedules the automatic start once every team has an animal.
    fn check_roster(self, ctx: GameContext<'_>) -> Step {
        match self {
            Self::Waiting { start_armed: false } if ctx.roster.has_enough_animals() => Step::to(
                Self::Waiting { start_armed: true },
                vec![
                    Effect::Emit(Event::GameAboutToStart {
                        seconds: ctx.config.start_delay_secs(),
                    }),
                    Effect::ArmStart(ctx.config.start_delay),
                ],
            ),
            _ => Step::stay(self),
        }
    }
}
