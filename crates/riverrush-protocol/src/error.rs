//! Error types for the protocol layer.
//!
//! Every way an incoming line can be rejected maps to one variant here.
//! None of them are retried: the owner of the connection logs the error
//! and drops the offending message.

use crate::EventType;

/// Errors that can occur while encoding or decoding events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The text is malformed: a pair did not split into exactly one key
    /// and one value, or the mandatory type pair is absent.
    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),

    /// The text is well formed but names an event type that is unknown
    /// or was never registered with the protocol. Usually a version
    /// mismatch between peers or a missing registration.
    #[error("invalid action: no event registered for `{0}`")]
    InvalidAction(String),

    /// A field the event needs is missing or does not parse.
    #[error("invalid field `{key}` for {event}: {reason}")]
    InvalidField {
        event: EventType,
        key: &'static str,
        reason: String,
    },

    /// The separators or type key cannot produce an unambiguous format.
    #[error("invalid protocol config: {0}")]
    InvalidConfig(String),

    /// JSON serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// JSON deserialization failed (malformed JSON, unknown `type`,
    /// missing fields).
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
