//! `Riverrush` builder: validates configuration and creates the session
//! manager a host drives.

use riverrush_game::{GameConfig, SessionManager};
use riverrush_protocol::{Event, EventType, Protocol, ProtocolConfig};

use crate::RiverrushError;

/// Entry point.
///
/// # Example
///
/// ```rust,ignore
/// use riverrush::prelude::*;
///
/// let mut sessions = Riverrush::builder()
///     .game_config(GameConfig { teams: 4, ..GameConfig::default() })
///     .build()?;
/// let session = sessions.create_session();
/// ```
pub struct Riverrush;

impl Riverrush {
    /// Creates a new builder.
    pub fn builder() -> RiverrushBuilder {
        RiverrushBuilder::new()
    }
}

type Factory = Box<dyn Fn() -> Event + Send + Sync>;

/// Builder for a [`SessionManager`] speaking the text protocol.
pub struct RiverrushBuilder {
    protocol_config: ProtocolConfig,
    game_config: GameConfig,
    overrides: Vec<(EventType, Factory)>,
}

impl RiverrushBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            protocol_config: ProtocolConfig::default(),
            game_config: GameConfig::default(),
            overrides: Vec::new(),
        }
    }

    /// Sets the wire separators and type key.
    pub fn protocol_config(mut self, config: ProtocolConfig) -> Self {
        self.protocol_config = config;
        self
    }

    /// Sets the per-session game configuration.
    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game_config = config;
        self
    }

    /// Replaces the factory used to decode one event type.
    pub fn register_network_message<F>(mut self, event_type: EventType, factory: F) -> Self
    where
        F: Fn() -> Event + Send + Sync + 'static,
    {
        self.overrides.push((event_type, Box::new(factory)));
        self
    }

    /// Validates both configurations and returns an empty session
    /// manager.
    pub fn build(self) -> Result<SessionManager<Protocol>, RiverrushError> {
        self.game_config.validate()?;
        let mut protocol = Protocol::new(self.protocol_config)?;
        for event_type in EventType::ALL {
            protocol.register_network_message(event_type, move || Event::blank(event_type));
        }
        for (event_type, factory) in self.overrides {
            protocol.register_network_message(event_type, factory);
        }

        tracing::info!(
            teams = self.game_config.teams,
            start_delay_ms = self.game_config.start_delay.as_millis() as u64,
            "session manager ready"
        );
        Ok(SessionManager::new(protocol, self.game_config))
    }
}

impl Default for RiverrushBuilder {
    fn default() -> Self {
        Self::new()
    }
}
