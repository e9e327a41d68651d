//! Session manager: creates, tracks, and routes clients to sessions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use riverrush_protocol::{ClientId, Codec, SessionId};

use crate::controller::ClientSender;
use crate::herd::{NoPresentation, Presentation};
use crate::session::spawn_session;
use crate::{GameConfig, GameError, SessionHandle, SessionInfo};

/// Counter for generating unique session ids.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Owns every running session and remembers which client is in which.
///
/// A client is connected to at most one session at a time.
pub struct SessionManager<C: Codec> {
    codec: Arc<C>,
    config: GameConfig,
    sessions: BTreeMap<SessionId, SessionHandle>,
    client_sessions: HashMap<ClientId, SessionId>,
}

impl<C: Codec> SessionManager<C> {
    /// Creates a manager whose sessions share `codec` and start from
    /// `config`.
    pub fn new(codec: C, config: GameConfig) -> Self {
        Self {
            codec: Arc::new(codec),
            config,
            sessions: BTreeMap::new(),
            client_sessions: HashMap::new(),
        }
    }

    /// Spawns a headless session and returns its id.
    pub fn create_session(&mut self) -> SessionId {
        self.create_session_with(Box::new(NoPresentation))
    }

    /// Spawns a session whose animal reactions go to `presentation`.
    pub fn create_session_with(&mut self, presentation: Box<dyn Presentation>) -> SessionId {
        let session_id = SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed));
        let handle = spawn_session(
            session_id,
            self.config.clone(),
            Arc::clone(&self.codec),
            presentation,
        );
        self.sessions.insert(session_id, handle);
        tracing::info!(%session_id, "session created");
        session_id
    }

    pub fn get(&self, session_id: SessionId) -> Option<&SessionHandle> {
        self.sessions.get(&session_id)
    }

    /// Connects a client's outbound channel to a session.
    pub async fn connect(
        &mut self,
        client: ClientId,
        session_id: SessionId,
        sender: ClientSender,
    ) -> Result<(), GameError> {
        if let Some(current) = self.client_sessions.get(&client) {
            return Err(GameError::AlreadyInSession(client, *current));
        }
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(GameError::SessionNotFound(session_id))?;

        handle.connect(client, sender).await?;
        self.client_sessions.insert(client, session_id);
        Ok(())
    }

    /// Connects a client to the oldest session still waiting for players,
    /// or to a new one.
    pub async fn connect_or_create(
        &mut self,
        client: ClientId,
        sender: ClientSender,
    ) -> Result<SessionId, GameError> {
        if let Some(current) = self.client_sessions.get(&client) {
            return Err(GameError::AlreadyInSession(client, *current));
        }

        let mut target = None;
        for handle in self.sessions.values() {
            if let Ok(info) = handle.get_info().await {
                if info.phase.is_joinable() {
                    target = Some(info.session_id);
                    break;
                }
            }
        }
        let session_id = match target {
            Some(id) => id,
            None => self.create_session(),
        };
        self.connect(client, session_id, sender).await?;
        Ok(session_id)
    }

    /// Disconnects a client from its session.
    pub async fn disconnect(&mut self, client: ClientId) -> Result<(), GameError> {
        let session_id = self
            .client_sessions
            .remove(&client)
            .ok_or(GameError::ClientNotInSession(client))?;
        if let Some(handle) = self.sessions.get(&session_id) {
            handle.disconnect(client).await?;
        }
        Ok(())
    }

    /// Routes a raw line from a client to its session.
    pub async fn route_message(&self, client: ClientId, raw: impl Into<String>) -> Result<(), GameError> {
        let session_id = self
            .client_sessions
            .get(&client)
            .ok_or(GameError::ClientNotInSession(client))?;
        let handle = self
            .sessions
            .get(session_id)
            .ok_or(GameError::SessionNotFound(*session_id))?;
        handle.send_message(client, raw).await
    }

    pub async fn get_session_info(&self, session_id: SessionId) -> Result<SessionInfo, GameError> {
        let handle = self
            .sessions
            .get(&session_id)
            .ok_or(GameError::SessionNotFound(session_id))?;
        handle.get_info().await
    }

    /// Shuts a session down and forgets its clients.
    pub async fn destroy_session(&mut self, session_id: SessionId) -> Result<(), GameError> {
        let handle = self
            .sessions
            .remove(&session_id)
            .ok_or(GameError::SessionNotFound(session_id))?;

        let _ = handle.shutdown().await;
        self.client_sessions.retain(|_, sid| *sid != session_id);

        tracing::info!(%session_id, "session destroyed");
        Ok(())
    }

    /// The session a client is connected to, if any.
    pub fn client_session(&self, client: ClientId) -> Option<SessionId> {
        self.client_sessions.get(&client).copied()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Session ids in creation order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.keys().copied().collect()
    }
}

impl<C: Codec + Default> Default for SessionManager<C> {
    fn default() -> Self {
        Self::new(C::default(), GameConfig::default())
    }
}
