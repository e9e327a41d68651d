//! The event model: every notification the game exchanges, in process
//! and over the network.
//!
//! An [`Event`] is a tagged enum. Its variant determines its
//! [`EventType`], and the `EventType` is what the dispatcher keys
//! handlers on and what the codec writes as the `type` pair. Nothing here
//! relies on runtime type inspection: the type identifier is just the
//! variant name.
//!
//! Each variant knows how to render its own fields as `key=value` pairs
//! ([`Event::serialize`]) and how to fill them back in from a parsed
//! key/value map ([`Event::deserialize`]). The codec only adds the type
//! pair and the separators.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AnimalId, Protocol, ProtocolError, TeamId};

/// Key/value pairs parsed from one wire message, including the type pair.
pub type Fields = HashMap<String, String>;

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

/// The identifier of an event kind.
///
/// This is the key of the codec's factory registry and of the
/// dispatcher's handler table. Its wire form is the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    GameWaiting,
    GameAboutToStart,
    GameStarted,
    GameStopped,
    GameFinished,
    AnimalAdded,
    AnimalRemoved,
    JumpCommand,
    PlayerJumped,
    AnimalDropped,
    AnimalCollided,
    AnimalFellOff,
    AnimalReturned,
    AddObstacle,
    RenderJoin,
}

impl EventType {
    /// Every event type, in declaration order.
    pub const ALL: [EventType; 15] = [
        Self::GameWaiting,
        Self::GameAboutToStart,
        Self::GameStarted,
        Self::GameStopped,
        Self::GameFinished,
        Self::AnimalAdded,
        Self::AnimalRemoved,
        Self::JumpCommand,
        Self::PlayerJumped,
        Self::AnimalDropped,
        Self::AnimalCollided,
        Self::AnimalFellOff,
        Self::AnimalReturned,
        Self::AddObstacle,
        Self::RenderJoin,
    ];

    /// The identifier written after `type=` on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GameWaiting => "GameWaiting",
            Self::GameAboutToStart => "GameAboutToStart",
            Self::GameStarted => "GameStarted",
            Self::GameStopped => "GameStopped",
            Self::GameFinished => "GameFinished",
            Self::AnimalAdded => "AnimalAdded",
            Self::AnimalRemoved => "AnimalRemoved",
            Self::JumpCommand => "JumpCommand",
            Self::PlayerJumped => "PlayerJumped",
            Self::AnimalDropped => "AnimalDropped",
            Self::AnimalCollided => "AnimalCollided",
            Self::AnimalFellOff => "AnimalFellOff",
            Self::AnimalReturned => "AnimalReturned",
            Self::AddObstacle => "AddObstacle",
            Self::RenderJoin => "RenderJoin",
        }
    }

    /// Returns `true` if sessions relay this kind of event to connected
    /// clients.
    ///
    /// Input-side events (`JumpCommand`, `RenderJoin`) and collision and
    /// landing reports produced by the presentation layer stay in process.
    pub fn is_broadcast(self) -> bool {
        !matches!(
            self,
            Self::JumpCommand
                | Self::RenderJoin
                | Self::AnimalCollided
                | Self::AnimalDropped
        )
    }

    /// Returns `true` if a connected client may send this kind of event.
    ///
    /// Lifecycle and roster notifications and the outcomes of animal
    /// actions are produced by the session itself.
    pub fn is_client_command(self) -> bool {
        matches!(
            self,
            Self::JumpCommand
                | Self::RenderJoin
                | Self::AnimalCollided
                | Self::AnimalDropped
                | Self::AddObstacle
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    /// Parses a wire identifier. Unknown identifiers are an
    /// [`ProtocolError::InvalidAction`], the same as known but
    /// unregistered ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ProtocolError::InvalidAction(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A domain notification.
///
/// Events are values: handlers receive `&Event` and never mutate it. The
/// only mutation is [`Event::deserialize`], called by the codec on a fresh
/// instance produced by a registered factory.
///
/// `#[serde(tag = "type")]` gives the JSON form the same `type`
/// discriminator the text form uses:
/// `{"type":"AnimalAdded","animal":3,"team":1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The session entered the waiting state.
    GameWaiting,
    /// Every team has an animal; the game starts in `seconds`.
    GameAboutToStart { seconds: u64 },
    /// The session entered the playing state.
    GameStarted,
    /// The session was stopped before finishing.
    GameStopped,
    /// The game ran to completion.
    GameFinished,
    /// An animal joined a team.
    AnimalAdded { animal: AnimalId, team: TeamId },
    /// An animal left the session.
    AnimalRemoved { animal: AnimalId, team: TeamId },
    /// A player pressed jump. Wire-level command vocabulary.
    JumpCommand { animal: AnimalId },
    /// Domain notification relayed from a [`Event::JumpCommand`].
    PlayerJumped { animal: AnimalId },
    /// The animal landed back on its boat.
    AnimalDropped { animal: AnimalId },
    /// The animal touched an obstacle.
    AnimalCollided { animal: AnimalId },
    /// The animal was knocked off its boat into the water.
    AnimalFellOff { animal: AnimalId },
    /// The animal climbed back onto its boat.
    AnimalReturned { animal: AnimalId },
    /// An obstacle appeared in a team's lane at `location` (0.0 to 1.0
    /// across the river).
    AddObstacle { team: TeamId, location: f64 },
    /// A rendering client announced itself.
    RenderJoin,
}

impl Event {
    /// The zero-valued event of the given type. This is what the default
    /// factories registered by [`Protocol::standard`] produce.
    pub fn blank(event_type: EventType) -> Self {
        let animal = AnimalId::default();
        let team = TeamId::default();
        match event_type {
            EventType::GameWaiting => Self::GameWaiting,
            EventType::GameAboutToStart => Self::GameAboutToStart { seconds: 0 },
            EventType::GameStarted => Self::GameStarted,
            EventType::GameStopped => Self::GameStopped,
            EventType::GameFinished => Self::GameFinished,
            EventType::AnimalAdded => Self::AnimalAdded { animal, team },
            EventType::AnimalRemoved => Self::AnimalRemoved { animal, team },
            EventType::JumpCommand => Self::JumpCommand { animal },
            EventType::PlayerJumped => Self::PlayerJumped { animal },
            EventType::AnimalDropped => Self::AnimalDropped { animal },
            EventType::AnimalCollided => Self::AnimalCollided { animal },
            EventType::AnimalFellOff => Self::AnimalFellOff { animal },
            EventType::AnimalReturned => Self::AnimalReturned { animal },
            EventType::AddObstacle => Self::AddObstacle { team, location: 0.0 },
            EventType::RenderJoin => Self::RenderJoin,
        }
    }

    /// The type identifier of this event.
    pub fn event_type(&self) -> EventType {
        match self {
            Self::GameWaiting => EventType::GameWaiting,
            Self::GameAboutToStart { .. } => EventType::GameAboutToStart,
            Self::GameStarted => EventType::GameStarted,
            Self::GameStopped => EventType::GameStopped,
            Self::GameFinished => EventType::GameFinished,
            Self::AnimalAdded { .. } => EventType::AnimalAdded,
            Self::AnimalRemoved { .. } => EventType::AnimalRemoved,
            Self::JumpCommand { .. } => EventType::JumpCommand,
            Self::PlayerJumped { .. } => EventType::PlayerJumped,
            Self::AnimalDropped { .. } => EventType::AnimalDropped,
            Self::AnimalCollided { .. } => EventType::AnimalCollided,
            Self::AnimalFellOff { .. } => EventType::AnimalFellOff,
            Self::AnimalReturned { .. } => EventType::AnimalReturned,
            Self::AddObstacle { .. } => EventType::AddObstacle,
            Self::RenderJoin => EventType::RenderJoin,
        }
    }

    /// The animal this event is about, if any.
    pub fn animal(&self) -> Option<AnimalId> {
        match self {
            Self::AnimalAdded { animal, .. }
            | Self::AnimalRemoved { animal, .. }
            | Self::JumpCommand { animal }
            | Self::PlayerJumped { animal }
            | Self::AnimalDropped { animal }
            | Self::AnimalCollided { animal }
            | Self::AnimalFellOff { animal }
            | Self::AnimalReturned { animal } => Some(*animal),
            _ => None,
        }
    }

    /// Renders this event's own fields as `key<kv>value` pairs joined by
    /// the protocol's pair separator. The type pair is not included; the
    /// codec appends it.
    pub fn serialize(&self, protocol: &Protocol) -> String {
        let kv = protocol.key_value_separator();
        self.pairs()
            .into_iter()
            .map(|(key, value)| format!("{key}{kv}{value}"))
            .collect::<Vec<_>>()
            .join(protocol.pair_separator())
    }

    /// Fills this event's fields from a parsed key/value map.
    ///
    /// Keys the event does not own (the type pair among them) are
    /// ignored. A missing or unparsable field leaves the event unchanged
    /// up to that field and fails with [`ProtocolError::InvalidField`].
    pub fn deserialize(&mut self, fields: &Fields) -> Result<(), ProtocolError> {
        let ty = self.event_type();
        match self {
            Self::GameWaiting
            | Self::GameStarted
            | Self::GameStopped
            | Self::GameFinished
            | Self::RenderJoin => {}
            Self::GameAboutToStart { seconds } => {
                *seconds = parse_field(fields, ty, "seconds")?;
            }
            Self::AnimalAdded { animal, team } | Self::AnimalRemoved { animal, team } => {
                *animal = AnimalId(parse_field(fields, ty, "animal")?);
                *team = TeamId(parse_field(fields, ty, "team")?);
            }
            Self::JumpCommand { animal }
            | Self::PlayerJumped { animal }
            | Self::AnimalDropped { animal }
            | Self::AnimalCollided { animal }
            | Self::AnimalFellOff { animal }
            | Self::AnimalReturned { animal } => {
                *animal = AnimalId(parse_field(fields, ty, "animal")?);
            }
            Self::AddObstacle { team, location } => {
                *team = TeamId(parse_field(fields, ty, "team")?);
                *location = check_location(ty, parse_field(fields, ty, "location")?)?;
            }
        }
        Ok(())
    }

    /// Checks field values a decoder accepted syntactically.
    ///
    /// An obstacle `location` must be a finite number in `0.0..=1.0`.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if let Self::AddObstacle { location, .. } = self {
            check_location(self.event_type(), *location)?;
        }
        Ok(())
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::GameWaiting
            | Self::GameStarted
            | Self::GameStopped
            | Self::GameFinished
            | Self::RenderJoin => Vec::new(),
            Self::GameAboutToStart { seconds } => vec![("seconds", seconds.to_string())],
            Self::AnimalAdded { animal, team } | Self::AnimalRemoved { animal, team } => vec![
                ("animal", animal.0.to_string()),
                ("team", team.0.to_string()),
            ],
            Self::JumpCommand { animal }
            | Self::PlayerJumped { animal }
            | Self::AnimalDropped { animal }
            | Self::AnimalCollided { animal }
            | Self::AnimalFellOff { animal }
            | Self::AnimalReturned { animal } => vec![("animal", animal.0.to_string())],
            Self::AddObstacle { team, location } => vec![
                ("team", team.0.to_string()),
                ("location", location.to_string()),
            ],
        }
    }
}

fn check_location(event: EventType, location: f64) -> Result<f64, ProtocolError> {
    if (0.0..=1.0).contains(&location) {
        Ok(location)
    } else {
        Err(ProtocolError::InvalidField {
            event,
            key: "location",
            reason: format!("{location} is outside 0.0..=1.0"),
        })
    }
}

fn parse_field<T>(fields: &Fields, event: EventType, key: &'static str) -> Result<T, ProtocolError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = fields.get(key).ok_or_else(|| ProtocolError::InvalidField {
        event,
        key,
        reason: "missing".to_string(),
    })?;
    raw.parse().map_err(|e| ProtocolError::InvalidField {
        event,
        key,
        reason: format!("{raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_event_type_wire_names_parse_back() {
        for ty in EventType::ALL {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_unknown_wire_name_is_invalid_action() {
        let err = "SomeUnknownEventClass".parse::<EventType>().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAction(name) if name == "SomeUnknownEventClass"));
    }

    #[test]
    fn test_blank_event_has_requested_type() {
        for ty in EventType::ALL {
            assert_eq!(Event::blank(ty).event_type(), ty);
        }
    }

    #[test]
    fn test_deserialize_fills_fields_and_ignores_type_pair() {
        let mut event = Event::blank(EventType::AnimalAdded);
        event
            .deserialize(&fields(&[("animal", "4"), ("team", "1"), ("type", "AnimalAdded")]))
            .unwrap();
        assert_eq!(
            event,
            Event::AnimalAdded {
                animal: AnimalId(4),
                team: TeamId(1)
            }
        );
    }

    #[test]
    fn test_deserialize_missing_field_fails() {
        let mut event = Event::blank(EventType::JumpCommand);
        let err = event.deserialize(&fields(&[("type", "JumpCommand")])).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidField { event: EventType::JumpCommand, key: "animal", .. }
        ));
    }

    #[test]
    fn test_deserialize_unparsable_field_fails() {
        let mut event = Event::blank(EventType::GameAboutToStart);
        let err = event.deserialize(&fields(&[("seconds", "soon")])).unwrap_err();
        assert!(err.to_string().contains("seconds"));
    }

    #[test]
    fn test_obstacle_location_must_be_in_lane() {
        for raw in ["NaN", "inf", "-0.1", "1.5"] {
            let mut event = Event::blank(EventType::AddObstacle);
            let err = event
                .deserialize(&fields(&[("team", "0"), ("location", raw)]))
                .unwrap_err();
            assert!(
                matches!(err, ProtocolError::InvalidField { key: "location", .. }),
                "{raw} accepted"
            );
        }

        let mut event = Event::blank(EventType::AddObstacle);
        event
            .deserialize(&fields(&[("team", "1"), ("location", "1")]))
            .unwrap();
        assert_eq!(event, Event::AddObstacle { team: TeamId(1), location: 1.0 });
    }

    #[test]
    fn test_animal_accessor() {
        assert_eq!(Event::PlayerJumped { animal: AnimalId(9) }.animal(), Some(AnimalId(9)));
        assert_eq!(Event::GameStarted.animal(), None);
        assert_eq!(
            Event::AddObstacle { team: TeamId(0), location: 0.5 }.animal(),
            None
        );
    }

    #[test]
    fn test_input_events_are_not_broadcast() {
        assert!(!EventType::JumpCommand.is_broadcast());
        assert!(!EventType::RenderJoin.is_broadcast());
        assert!(!EventType::AnimalCollided.is_broadcast());
        assert!(EventType::GameStarted.is_broadcast());
        assert!(EventType::AnimalFellOff.is_broadcast());
        assert!(EventType::AddObstacle.is_broadcast());
    }

    #[test]
    fn test_only_commands_are_accepted_from_clients() {
        let accepted: Vec<EventType> = EventType::ALL
            .into_iter()
            .filter(|ty| ty.is_client_command())
            .collect();
        assert_eq!(
            accepted,
            vec![
                EventType::JumpCommand,
                EventType::AnimalDropped,
                EventType::AnimalCollided,
                EventType::AddObstacle,
                EventType::RenderJoin,
            ]
        );
    }

    #[test]
    fn test_json_shape_uses_type_tag() {
        let event = Event::AnimalAdded {
            animal: AnimalId(3),
            team: TeamId(1),
        };
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AnimalAdded");
        assert_eq!(json["animal"], 3);
        assert_eq!(json["team"], 1);
    }
}
