//! Codecs: converting [`Event`]s to and from their wire text.
//!
//! [`Protocol`] is the line-oriented text format the game speaks:
//!
//! ```text
//! animal=3;team=1;type=AnimalAdded;
//! ```
//!
//! It owns the separators and a registry mapping each [`EventType`] to a
//! zero-argument factory. Decoding looks the `type` pair up in that
//! registry, asks the factory for a fresh event, and lets the event fill
//! in its own fields. Types that were never registered cannot be decoded.
//!
//! [`JsonCodec`] is an alternative wire format behind the `json` feature.
//! Both implement [`Codec`], the seam sessions are generic over.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Event, EventType, Fields, ProtocolError};

/// Produces a fresh, mutable event for the decoder to fill in.
pub type EventFactory = Arc<dyn Fn() -> Event + Send + Sync>;

/// Converts events to wire text and back.
///
/// `Send + Sync + 'static` because one codec instance is shared
/// read-only by a session actor for its whole lifetime.
pub trait Codec: Send + Sync + 'static {
    /// Encodes an event into one wire message.
    fn encode(&self, event: &Event) -> Result<String, ProtocolError>;

    /// Decodes one wire message into an event.
    fn decode(&self, text: &str) -> Result<Event, ProtocolError>;
}

// ---------------------------------------------------------------------------
// ProtocolConfig
// ---------------------------------------------------------------------------

/// Separators and type key of the text format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Separates `key=value` pairs. Default `;`.
    pub pair_separator: String,
    /// Separates a key from its value. Default `=`.
    pub key_value_separator: String,
    /// Key of the mandatory pair naming the event type. Default `type`.
    pub type_key: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            pair_separator: ";".to_string(),
            key_value_separator: "=".to_string(),
            type_key: "type".to_string(),
        }
    }
}

impl ProtocolConfig {
    /// Rejects configurations that cannot be parsed unambiguously.
    ///
    /// Separators must be non-empty and distinct, and neither may contain
    /// the other. The type key must be non-empty and contain neither
    /// separator.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let pair = &self.pair_separator;
        let kv = &self.key_value_separator;
        if pair.is_empty() || kv.is_empty() {
            return Err(ProtocolError::InvalidConfig("separators must not be empty".into()));
        }
        if pair.contains(kv.as_str()) || kv.contains(pair.as_str()) {
            return Err(ProtocolError::InvalidConfig(format!(
                "separators {pair:?} and {kv:?} overlap"
            )));
        }
        if self.type_key.is_empty()
            || self.type_key.contains(pair.as_str())
            || self.type_key.contains(kv.as_str())
        {
            return Err(ProtocolError::InvalidConfig(format!(
                "type key {:?} is empty or contains a separator",
                self.type_key
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// The text codec plus its event factory registry.
///
/// Build one per server with [`Protocol::standard`] and share it behind an
/// `Arc`; registration happens up front, decoding is read-only.
pub struct Protocol {
    config: ProtocolConfig,
    factories: HashMap<EventType, EventFactory>,
}

impl Protocol {
    /// Creates a protocol with an empty registry.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidConfig`] if the config fails
    /// [`ProtocolConfig::validate`].
    pub fn new(config: ProtocolConfig) -> Result<Self, ProtocolError> {
        config.validate()?;
        Ok(Self {
            config,
            factories: HashMap::new(),
        })
    }

    /// Default separators with every [`EventType`] registered to produce
    /// [`Event::blank`].
    pub fn standard() -> Self {
        let mut protocol = Self {
            config: ProtocolConfig::default(),
            factories: HashMap::new(),
        };
        for ty in EventType::ALL {
            protocol.register_network_message(ty, move || Event::blank(ty));
        }
        protocol
    }

    /// Registers the factory used to decode messages of `event_type`.
    ///
    /// Registering a type again replaces its factory (last write wins).
    /// Returns `true` when an existing factory was replaced.
    pub fn register_network_message<F>(&mut self, event_type: EventType, factory: F) -> bool
    where
        F: Fn() -> Event + Send + Sync + 'static,
    {
        let replaced = self
            .factories
            .insert(event_type, Arc::new(factory))
            .is_some();
        if replaced {
            tracing::debug!(event = %event_type, "replaced event factory");
        }
        replaced
    }

    /// Returns `true` if messages of `event_type` can be decoded.
    pub fn is_registered(&self, event_type: EventType) -> bool {
        self.factories.contains_key(&event_type)
    }

    /// The configured pair separator.
    pub fn pair_separator(&self) -> &str {
        &self.config.pair_separator
    }

    /// The configured key/value separator.
    pub fn key_value_separator(&self) -> &str {
        &self.config.key_value_separator
    }

    /// The key of the type pair.
    pub fn type_key(&self) -> &str {
        &self.config.type_key
    }

    /// Encodes an event: its own pairs, then the type pair, each pair
    /// terminated by the pair separator.
    pub fn serialize(&self, event: &Event) -> String {
        let pair = self.pair_separator();
        let mut out = event.serialize(self);
        if !out.is_empty() {
            out.push_str(pair);
        }
        out.push_str(self.type_key());
        out.push_str(self.key_value_separator());
        out.push_str(event.event_type().as_str());
        out.push_str(pair);
        out
    }

    /// Decodes one wire message.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidProtocol`] if a pair does not split into
    ///   exactly one key and one value, or there is no type pair.
    /// - [`ProtocolError::InvalidAction`] if the type is unknown or not
    ///   registered.
    /// - [`ProtocolError::InvalidField`] if the event rejects its fields.
    pub fn deserialize(&self, text: &str) -> Result<Event, ProtocolError> {
        let fields = self.split_pairs(text)?;
        let type_id = fields.get(self.type_key()).ok_or_else(|| {
            ProtocolError::InvalidProtocol(format!("missing `{}` pair", self.type_key()))
        })?;
        let event_type: EventType = type_id.parse()?;
        let factory = self
            .factories
            .get(&event_type)
            .ok_or_else(|| ProtocolError::InvalidAction(type_id.clone()))?;

        let mut event = factory();
        event.deserialize(&fields)?;
        Ok(event)
    }

    /// Splits `k=v;k=v;` into a map. One trailing pair separator is
    /// allowed; any other empty segment is malformed. Values are not
    /// escaped, so a value containing a separator is rejected here.
    fn split_pairs(&self, text: &str) -> Result<Fields, ProtocolError> {
        let pair_sep = self.pair_separator();
        let kv_sep = self.key_value_separator();
        let body = text.strip_suffix(pair_sep).unwrap_or(text);

        let mut fields = Fields::new();
        for pair in body.split(pair_sep) {
            let mut parts = pair.split(kv_sep);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) if !key.is_empty() => {
                    fields.insert(key.to_string(), value.to_string());
                }
                _ => {
                    return Err(ProtocolError::InvalidProtocol(format!(
                        "{pair:?} is not a single key{kv_sep}value pair"
                    )));
                }
            }
        }
        Ok(fields)
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut registered: Vec<_> = self.factories.keys().copied().collect();
        registered.sort();
        f.debug_struct("Protocol")
            .field("config", &self.config)
            .field("registered", &registered)
            .finish()
    }
}

impl Codec for Protocol {
    fn encode(&self, event: &Event) -> Result<String, ProtocolError> {
        Ok(self.serialize(event))
    }

    fn decode(&self, text: &str) -> Result<Event, ProtocolError> {
        self.deserialize(text)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] producing internally tagged JSON,
/// e.g. `{"type":"PlayerJumped","animal":3}`.
///
/// There is no registry: every [`EventType`] is decodable, and an unknown
/// `type` is a [`ProtocolError::Decode`].
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, event: &Event) -> Result<String, ProtocolError> {
        serde_json::to_string(event).map_err(ProtocolError::Encode)
    }

    fn decode(&self, text: &str) -> Result<Event, ProtocolError> {
        let event: Event = serde_json::from_str(text).map_err(ProtocolError::Decode)?;
        event.validate()?;
        Ok(event)
    }
}
