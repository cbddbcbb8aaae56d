//! Event name taxonomy.
//!
//! Wire-level names (`<service>.<resource>`) are used to bind transport
//! listeners; public names are what the client broadcasts to subscribers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Building blocks the event names are assembled from.
pub mod components {
    /// Public resource names.
    pub mod resources {
        pub const ALL: &str = "all";
        pub const USERSTATE: &str = "usersub.userstate";
    }

    /// Public service names.
    pub mod services {
        pub const USERSUB: &str = "usersub";
        pub const PRESENCE: &str = "presence";
    }

    /// Verbs carried by usersub events.
    pub mod verbs {
        pub const CREATE: &str = "create";
        pub const TERMINATE: &str = "terminate";
        pub const UPDATE: &str = "update";
    }

    /// Wire event type discriminators.
    pub mod event_types {
        pub const USERSTATE: &str = "usersub.userstate";
    }
}

/// Names used to bind listeners on the transport.
#[derive(Debug, Clone, Copy)]
pub struct InternalEvents {
    pub userstate: &'static str,
}

impl InternalEvents {
    /// Every internal event name, in declaration order.
    #[must_use]
    pub fn all(&self) -> [&'static str; 1] {
        [self.userstate]
    }
}

/// Names used when broadcasting to application subscribers.
#[derive(Debug, Clone, Copy)]
pub struct ExternalEvents {
    /// Wildcard name every normalized event is also published under.
    pub all: &'static str,
    pub presence: &'static str,
    pub userstate: &'static str,
}

/// The complete event table.
#[derive(Debug, Clone, Copy)]
pub struct Events {
    pub internal: InternalEvents,
    pub external: ExternalEvents,
}

/// Process-wide event table.
pub const EVENTS: Events = Events {
    internal: InternalEvents {
        userstate: components::event_types::USERSTATE,
    },
    external: ExternalEvents {
        all: components::resources::ALL,
        presence: components::services::PRESENCE,
        userstate: components::event_types::USERSTATE,
    },
};

/// An owned copy of the event table.
///
/// Keys are the symbolic names, values the strings used on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTaxonomy {
    pub internal: BTreeMap<String, String>,
    pub external: BTreeMap<String, String>,
}

impl EventTaxonomy {
    /// Take a snapshot of [`EVENTS`].
    ///
    /// Callers may mutate the returned value freely.
    #[must_use]
    pub fn snapshot() -> Self {
        let internal = [("USERSTATE", EVENTS.internal.userstate)];
        let external = [
            ("ALL", EVENTS.external.all),
            ("PRESENCE", EVENTS.external.presence),
            ("USERSTATE", EVENTS.external.userstate),
        ];

        Self {
            internal: internal
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            external: external
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// Name of the transport-side bus event for a wire event name.
    #[must_use]
    pub fn transport_event(internal: &str) -> String {
        format!("event:{internal}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(EVENTS.internal.userstate, "usersub.userstate");
        assert_eq!(EVENTS.external.all, "all");
        assert_eq!(EVENTS.external.presence, "presence");
        assert_eq!(EVENTS.external.userstate, "usersub.userstate");
        assert_eq!(EVENTS.internal.all(), ["usersub.userstate"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut snapshot = EventTaxonomy::snapshot();
        snapshot
            .external
            .insert("ALL".to_string(), "mutated".to_string());

        assert_eq!(EventTaxonomy::snapshot().external["ALL"], "all");
        assert_eq!(EVENTS.external.all, "all");
    }

    #[test]
    fn test_transport_event_name() {
        assert_eq!(
            EventTaxonomy::transport_event("usersub.userstate"),
            "event:usersub.userstate"
        );
    }
}
