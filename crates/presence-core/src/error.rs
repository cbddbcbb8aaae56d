//! Error types for the presence client.

use thiserror::Error;

/// Errors surfaced by host collaborators.
///
/// These are passed through unmodified; the client adds no retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// The transport could not connect.
    #[error("Transport connect failed: {0}")]
    Connect(String),

    /// Publishing on the event bus failed.
    #[error("Publish failed: {0}")]
    Publish(String),

    /// A service request failed.
    #[error("Request failed: {0}")]
    Request(String),

    /// Reading or writing a feature flag failed.
    #[error("Feature flag operation failed: {0}")]
    Feature(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Presence client errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    /// A required argument was missing.
    #[error("{0}")]
    Validation(&'static str),

    /// A raw event carried a type discriminator outside the taxonomy.
    #[error("Unknown event type: \"{0}\"")]
    UnrecognizedEvent(String),

    /// Unbind was requested for a listener that is not bound.
    #[error("Event \"{0}\" is not currently active")]
    NotActive(String),

    /// A raw event did not have the expected shape.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Error from a host collaborator.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl PresenceError {
    /// Short label used for metrics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::UnrecognizedEvent(_) => "unrecognized_event",
            Self::NotActive(_) => "not_active",
            Self::MalformedEvent(_) => "malformed_event",
            Self::Host(_) => "host",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PresenceError::UnrecognizedEvent("foo.bar".into()).to_string(),
            "Unknown event type: \"foo.bar\""
        );
        assert_eq!(
            PresenceError::NotActive("usersub.userstate".into()).to_string(),
            "Event \"usersub.userstate\" is not currently active"
        );
    }

    #[test]
    fn test_host_error_is_transparent() {
        let err: PresenceError = HostError::Request("503".into()).into();
        assert_eq!(err.to_string(), "Request failed: 503");
        assert_eq!(err.kind(), "host");
    }
}
