//! Session configuration and the coarse game phase.

use std::time::Duration;

use riverrush_protocol::{Event, ProtocolError};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Configuration for one game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Delay between the roster becoming complete and the automatic start.
    pub start_delay: Duration,

    /// Number of teams (boats) in the session.
    pub teams: usize,

    /// Maximum animals per team.
    pub max_animals_per_team: usize,

    /// Capacity of the session actor's command channel.
    pub channel_size: usize,
}

impl GameConfig {
    /// The start delay in whole seconds, rounded up, as announced to
    /// clients in `GameAboutToStart`.
    pub fn start_delay_secs(&self) -> u64 {
        self.start_delay.as_secs() + u64::from(self.start_delay.subsec_nanos() > 0)
    }

    /// Checks the values that would make a session unusable.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.teams == 0 {
            return Err(ProtocolError::InvalidConfig("teams must be at least 1".into()));
        }
        if self.max_animals_per_team == 0 {
            return Err(ProtocolError::InvalidConfig(
                "max_animals_per_team must be at least 1".into(),
            ));
        }
        if self.channel_size == 0 {
            return Err(ProtocolError::InvalidConfig("channel_size must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_delay: Duration::from_secs(5),
            teams: 2,
            max_animals_per_team: 8,
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// GamePhase
// ---------------------------------------------------------------------------

/// The coarse lifecycle phase of a game.
///
/// ```text
/// Waiting ──start──▶ Playing ──finish──▶ Finished
///    │                  │
///    └──stop──▶ Stopped ◀──stop──┘
///                  │
///                  └──wait_for_players──▶ Waiting
/// ```
///
/// `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    Waiting,
    Playing,
    Stopped,
    Finished,
}

impl GamePhase {
    /// Returns `true` while animals may still join for the next round.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Waiting | Self::Stopped)
    }

    /// Returns `true` while the race is running.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Playing)
    }

    /// Returns `true` once no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// The notification emitted when this phase is entered. Also sent to
    /// clients that connect mid-session.
    pub fn entered_event(&self) -> Event {
        match self {
            Self::Waiting => Event::GameWaiting,
            Self::Playing => Event::GameStarted,
            Self::Stopped => Event::GameStopped,
            Self::Finished => Event::GameFinished,
        }
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Playing => write!(f, "Playing"),
            Self::Stopped => write!(f, "Stopped"),
            Self::Finished => write!(f, "Finished"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_config_default() {
        let config = GameConfig::default();
        assert_eq!(config.start_delay, Duration::from_secs(5));
        assert_eq!(config.teams, 2);
        assert_eq!(config.max_animals_per_team, 8);
        assert_eq!(config.channel_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_start_delay_secs_rounds_up() {
        let mut config = GameConfig::default();
        assert_eq!(config.start_delay_secs(), 5);
        config.start_delay = Duration::from_millis(1500);
        assert_eq!(config.start_delay_secs(), 2);
        config.start_delay = Duration::ZERO;
        assert_eq!(config.start_delay_secs(), 0);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = GameConfig {
            teams: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GameConfig {
            max_animals_per_team: 0,
            ..GameConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_game_phase_predicates() {
        assert!(GamePhase::Waiting.is_joinable());
        assert!(GamePhase::Stopped.is_joinable());
        assert!(!GamePhase::Playing.is_joinable());
        assert!(GamePhase::Playing.is_active());
        assert!(GamePhase::Finished.is_terminal());
        assert!(!GamePhase::Stopped.is_terminal());
    }

    #[test]
    fn test_entered_event_matches_phase() {
        assert_eq!(GamePhase::Waiting.entered_event(), Event::GameWaiting);
        assert_eq!(GamePhase::Playing.entered_event(), Event::GameStarted);
        assert_eq!(GamePhase::Stopped.entered_event(), Event::GameStopped);
        assert_eq!(GamePhase::Finished.entered_event(), Event::GameFinished);
    }

    #[test]
    fn test_game_phase_display() {
        assert_eq!(GamePhase::Waiting.to_string(), "Waiting");
        assert_eq!(GamePhase::Finished.to_string(), "Finished");
    }
}
