//! Classification of raw push events.
//!
//! A raw event carries its wire discriminator at `data.eventType`. The
//! envelope is a copy of the raw event with `event` set to the public
//! name the event is broadcast under.

use crate::error::PresenceError;
use crate::events::EVENTS;
use serde_json::Value;

/// Wire event types the client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireEvent {
    /// A subscribed user's state changed.
    UserState,
}

impl WireEvent {
    /// Parse a wire discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::UnrecognizedEvent`] carrying the value.
    pub fn parse(event_type: &str) -> Result<Self, PresenceError> {
        match event_type {
            t if t == EVENTS.internal.userstate => Ok(Self::UserState),
            other => Err(PresenceError::UnrecognizedEvent(other.to_string())),
        }
    }

    /// Public name envelopes of this type are broadcast under.
    #[must_use]
    pub fn external_name(self) -> &'static str {
        match self {
            Self::UserState => EVENTS.external.userstate,
        }
    }
}

/// Read the `data.eventType` discriminator of a raw event.
///
/// # Errors
///
/// Returns [`PresenceError::MalformedEvent`] if it is absent or not a string.
pub fn event_type(raw: &Value) -> Result<&str, PresenceError> {
    raw.get("data")
        .and_then(|data| data.get("eventType"))
        .and_then(Value::as_str)
        .ok_or_else(|| PresenceError::MalformedEvent("missing data.eventType".to_string()))
}

/// A normalized event ready for broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    kind: WireEvent,
    value: Value,
}

impl Envelope {
    /// Classify a raw event and build its envelope.
    ///
    /// The raw event is copied; it is never modified.
    ///
    /// # Errors
    ///
    /// Returns an error if the discriminator is missing or unrecognized.
    pub fn from_raw(raw: &Value) -> Result<Self, PresenceError> {
        let kind = WireEvent::parse(event_type(raw)?)?;

        let mut value = raw.clone();
        match value.as_object_mut() {
            Some(object) => {
                object.insert(
                    "event".to_string(),
                    Value::String(kind.external_name().to_string()),
                );
            }
            None => {
                return Err(PresenceError::MalformedEvent(
                    "event is not an object".to_string(),
                ))
            }
        }

        Ok(Self { kind, value })
    }

    /// The wire event this envelope was built from.
    #[must_use]
    pub fn kind(&self) -> WireEvent {
        self.kind
    }

    /// The public event name.
    #[must_use]
    pub fn event(&self) -> &'static str {
        self.kind.external_name()
    }

    /// The envelope body.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consume the envelope, returning its body.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }
}
