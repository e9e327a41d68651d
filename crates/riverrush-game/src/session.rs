//! Session actor: an isolated Tokio task that owns one [`Controller`].
//!
//! Network lines, lifecycle commands and the start countdown all reach the
//! controller through the same `select!` loop, so the game state is only
//! ever touched from this task.

use std::sync::Arc;
use std::time::Duration;

use riverrush_dispatch::EventDispatcher;
use riverrush_protocol::{AnimalId, ClientId, Codec, SessionId, TeamId};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::animal_state::AnimalState;
use crate::controller::{ClientSender, Controller};
use crate::herd::Presentation;
use crate::{GameConfig, GameError, GamePhase};

/// Lifecycle operations a caller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
    Finish,
    WaitForPlayers,
}

/// Commands sent to a session actor through its channel.
pub(crate) enum SessionCommand {
    Connect {
        client: ClientId,
        sender: ClientSender,
        reply: oneshot::Sender<Result<(), GameError>>,
    },
    Disconnect {
        client: ClientId,
    },
    /// A raw line from a client. Fire-and-forget: decode failures are
    /// logged and the line is dropped.
    Message {
        client: ClientId,
        raw: String,
    },
    AddAnimal {
        animal: AnimalId,
        team: Option<TeamId>,
        reply: oneshot::Sender<Result<TeamId, GameError>>,
    },
    RemoveAnimal {
        animal: AnimalId,
        reply: oneshot::Sender<Result<TeamId, GameError>>,
    },
    ReturnToBoat {
        animal: AnimalId,
        reply: oneshot::Sender<Result<AnimalState, GameError>>,
    },
    Transition {
        transition: Transition,
        reply: oneshot::Sender<Result<GamePhase, GameError>>,
    },
    GetInfo {
        reply: oneshot::Sender<SessionInfo>,
    },
    Shutdown,
}

/// A snapshot of session metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub phase: GamePhase,
    pub animals: usize,
    pub clients: usize,
    /// Time left before the automatic start, if it is scheduled.
    pub start_in: Option<Duration>,
}

/// Handle to a running session actor. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<SessionCommand>,
    dispatcher: EventDispatcher,
}

impl SessionHandle {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// The session's dispatcher. Handlers attached here run on the
    /// session task.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub async fn connect(&self, client: ClientId, sender: ClientSender) -> Result<(), GameError> {
        self.request(|reply| SessionCommand::Connect {
            client,
            sender,
            reply,
        })
        .await?
    }

    pub async fn disconnect(&self, client: ClientId) -> Result<(), GameError> {
        self.send(SessionCommand::Disconnect { client }).await
    }

    /// Delivers a raw network line from `client`.
    pub async fn send_message(&self, client: ClientId, raw: impl Into<String>) -> Result<(), GameError> {
        self.send(SessionCommand::Message {
            client,
            raw: raw.into(),
        })
        .await
    }

    pub async fn add_animal(&self, animal: AnimalId, team: Option<TeamId>) -> Result<TeamId, GameError> {
        self.request(|reply| SessionCommand::AddAnimal {
            animal,
            team,
            reply,
        })
        .await?
    }

    pub async fn remove_animal(&self, animal: AnimalId) -> Result<TeamId, GameError> {
        self.request(|reply| SessionCommand::RemoveAnimal { animal, reply })
            .await?
    }

    pub async fn return_to_boat(&self, animal: AnimalId) -> Result<AnimalState, GameError> {
        self.request(|reply| SessionCommand::ReturnToBoat { animal, reply })
            .await?
    }

    pub async fn transition(&self, transition: Transition) -> Result<GamePhase, GameError> {
        self.request(|reply| SessionCommand::Transition { transition, reply })
            .await?
    }

    pub async fn start(&self) -> Result<GamePhase, GameError> {
        self.transition(Transition::Start).await
    }

    pub async fn stop(&self) -> Result<GamePhase, GameError> {
        self.transition(Transition::Stop).await
    }

    pub async fn finish(&self) -> Result<GamePhase, GameError> {
        self.transition(Transition::Finish).await
    }

    pub async fn wait_for_players(&self) -> Result<GamePhase, GameError> {
        self.transition(Transition::WaitForPlayers).await
    }

    pub async fn get_info(&self) -> Result<SessionInfo, GameError> {
        self.request(|reply| SessionCommand::GetInfo { reply }).await
    }

    /// Tells the session to shut down.
    pub async fn shutdown(&self) -> Result<(), GameError> {
        self.send(SessionCommand::Shutdown).await
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), GameError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| GameError::Unavailable(self.session_id))
    }

    /// Sends a command carrying a reply channel and waits for the answer.
    async fn request<T>(
        &self,
        cmd: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(cmd(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| GameError::Unavailable(self.session_id))
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .finish()
    }
}

struct SessionActor<C: Codec> {
    controller: Controller<C>,
    receiver: mpsc::Receiver<SessionCommand>,
}

impl<C: Codec> SessionActor<C> {
    async fn run(mut self) {
        let session_id = self.controller.session_id();
        info!(%session_id, "session started");
        if let Err(e) = self.controller.open() {
            warn!(%session_id, error = %e, "failed to enter initial state");
        }

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
                expired = self.controller.countdown_mut().wait() => {
                    if let Err(e) = self.controller.on_countdown(expired) {
                        warn!(%session_id, error = %e, "automatic start failed");
                    }
                }
            }
        }

        self.controller.shutdown();
        info!(%session_id, "session stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle(&mut self, cmd: SessionCommand) -> bool {
        let session_id = self.controller.session_id();
        match cmd {
            SessionCommand::Connect {
                client,
                sender,
                reply,
            } => {
                let _ = reply.send(self.controller.connect(client, sender));
            }
            SessionCommand::Disconnect { client } => {
                self.controller.disconnect(client);
            }
            SessionCommand::Message { client, raw } => {
                if let Err(e) = self.controller.on_client_message(client, &raw) {
                    warn!(%session_id, %client, error = %e, "message discarded");
                }
            }
            SessionCommand::AddAnimal {
                animal,
                team,
                reply,
            } => {
                let _ = reply.send(self.controller.add_animal(animal, team));
            }
            SessionCommand::RemoveAnimal { animal, reply } => {
                let _ = reply.send(self.controller.remove_animal(animal));
            }
            SessionCommand::ReturnToBoat { animal, reply } => {
                let _ = reply.send(self.controller.return_to_boat(animal));
            }
            SessionCommand::Transition { transition, reply } => {
                let result = match transition {
                    Transition::Start => self.controller.start(),
                    Transition::Stop => self.controller.stop(),
                    Transition::Finish => self.controller.finish(),
                    Transition::WaitForPlayers => self.controller.wait_for_players(),
                };
                let _ = reply.send(result);
            }
            SessionCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::Shutdown => {
                info!(%session_id, "session shutting down");
                return false;
            }
        }
        true
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.controller.session_id(),
            phase: self.controller.phase(),
            animals: self.controller.roster().animal_count(),
            clients: self.controller.client_count(),
            start_in: self.controller.countdown().remaining(),
        }
    }
}

/// Spawns a session actor and returns a handle to it.
///
/// `config.channel_size` bounds the command channel; senders wait when it
/// is full.
pub fn spawn_session<C: Codec>(
    session_id: SessionId,
    config: GameConfig,
    codec: Arc<C>,
    presentation: Box<dyn Presentation>,
) -> SessionHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));
    let controller = Controller::new(session_id, config, codec, presentation);
    let dispatcher = controller.dispatcher().clone();

    tokio::spawn(
        SessionActor {
            controller,
            receiver: rx,
        }
        .run(),
    );

    SessionHandle {
        session_id,
        sender: tx,
        dispatcher,
    }
}
