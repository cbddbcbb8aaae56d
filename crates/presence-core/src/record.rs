//! Presence records derived from user-state events.

use crate::error::PresenceError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::trace;

/// Presence status of one subject.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    #[serde(default)]
    pub url: String,
    pub subject: String,
    pub status: String,
    pub status_time: String,
    pub last_active: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<String>,
    #[serde(rename = "expiresTTL")]
    pub expires_ttl: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_time: Option<String>,
    #[serde(default)]
    pub vector_counters: Map<String, Value>,
    #[serde(default)]
    pub suppress_notifications: bool,
    #[serde(default)]
    pub last_seen_device_url: String,
}

/// One entry of a user-state event's `compositions` list.
#[derive(Debug, Clone, Deserialize)]
struct RawComposition {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    composition: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct Availability {
    #[serde(rename = "type")]
    status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastActivity {
    last_active_time: String,
}

/// A composition entry decoded by its type tag.
#[derive(Debug, Clone)]
enum Composition {
    Availability(Availability),
    LastActivity(LastActivity),
    Other,
}

impl Composition {
    fn decode(raw: RawComposition) -> Result<Self, PresenceError> {
        let malformed = |e: serde_json::Error| {
            PresenceError::MalformedEvent(format!("{} composition: {e}", raw.kind))
        };

        match raw.kind.as_str() {
            "availability" => serde_json::from_value(raw.composition.clone())
                .map(Self::Availability)
                .map_err(malformed),
            "lastActivity" => serde_json::from_value(raw.composition.clone())
                .map(Self::LastActivity)
                .map_err(malformed),
            other => {
                trace!(kind = %other, "Ignoring composition");
                Ok(Self::Other)
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct UserStateData {
    user: String,
    ttl: i64,
    #[serde(default)]
    compositions: Vec<RawComposition>,
}

/// The typed payload of a `usersub.userstate` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserState {
    pub user: String,
    pub ttl: i64,
    pub availability: String,
    pub last_active_time: String,
}

impl UserState {
    /// Decode the `data` of a user-state envelope.
    ///
    /// The first `availability` and `lastActivity` compositions are used.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::MalformedEvent`] if `data` does not decode or
    /// either composition is missing.
    pub fn from_event(event: &Value) -> Result<Self, PresenceError> {
        let data = event
            .get("data")
            .cloned()
            .ok_or_else(|| PresenceError::MalformedEvent("missing data".to_string()))?;
        let data: UserStateData = serde_json::from_value(data)
            .map_err(|e| PresenceError::MalformedEvent(format!("userstate data: {e}")))?;

        let mut availability = None;
        let mut last_activity = None;
        for raw in data.compositions {
            // Later duplicates of a tag already found are never decoded
            let filled = match raw.kind.as_str() {
                "availability" => availability.is_some(),
                "lastActivity" => last_activity.is_some(),
                _ => false,
            };
            if filled {
                continue;
            }

            match Composition::decode(raw)? {
                Composition::Availability(a) => availability = Some(a),
                Composition::LastActivity(l) => last_activity = Some(l),
                Composition::Other => {}
            }
        }

        let availability = availability.ok_or_else(|| {
            PresenceError::MalformedEvent("missing availability composition".to_string())
        })?;
        let last_activity = last_activity.ok_or_else(|| {
            PresenceError::MalformedEvent("missing lastActivity composition".to_string())
        })?;

        Ok(Self {
            user: data.user,
            ttl: data.ttl,
            availability: availability.status,
            last_active_time: last_activity.last_active_time,
        })
    }
}

impl From<UserState> for PresenceRecord {
    fn from(state: UserState) -> Self {
        Self {
            subject: state.user,
            status: state.availability,
            status_time: state.last_active_time.clone(),
            last_active: state.last_active_time,
            expires_ttl: state.ttl,
            ..Self::default()
        }
    }
}

impl PresenceRecord {
    /// Derive a record from a user-state envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the event is malformed.
    pub fn from_event(event: &Value) -> Result<Self, PresenceError> {
        UserState::from_event(event).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn userstate_event(user: &str) -> Value {
        json!({
            "event": "usersub.userstate",
            "data": {
                "eventType": "usersub.userstate",
                "user": user,
                "ttl": 600,
                "compositions": [
                    {"type": "availability", "composition": {"type": "active"}},
                    {"type": "callStatus", "composition": {"inCall": false}},
                    {"type": "lastActivity", "composition": {"lastActiveTime": "2024-05-01T10:00:00Z"}},
                ],
            },
        })
    }

    #[test]
    fn test_record_from_event() {
        let record = PresenceRecord::from_event(&userstate_event("person-a")).unwrap();

        assert_eq!(record.subject, "person-a");
        assert_eq!(record.status, "active");
        assert_eq!(record.status_time, "2024-05-01T10:00:00Z");
        assert_eq!(record.last_active, "2024-05-01T10:00:00Z");
        assert_eq!(record.expires_ttl, 600);
        assert!(record.expires.is_none());
        assert!(!record.suppress_notifications);
    }

    #[test]
    fn test_missing_availability_is_an_error() {
        let mut event = userstate_event("person-a");
        event["data"]["compositions"] = json!([
            {"type": "lastActivity", "composition": {"lastActiveTime": "2024-05-01T10:00:00Z"}},
        ]);

        assert_eq!(
            PresenceRecord::from_event(&event),
            Err(PresenceError::MalformedEvent(
                "missing availability composition".to_string()
            ))
        );
    }

    #[test]
    fn test_missing_compositions_is_an_error() {
        let event = json!({"data": {"user": "person-a", "ttl": 1}});
        assert!(PresenceRecord::from_event(&event).is_err());
    }

    #[test]
    fn test_bad_composition_shape_is_an_error() {
        let mut event = userstate_event("person-a");
        event["data"]["compositions"][0]["composition"] = json!({"status": 1});

        assert!(matches!(
            PresenceRecord::from_event(&event),
            Err(PresenceError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_first_composition_of_each_type_wins() {
        let mut event = userstate_event("person-a");
        event["data"]["compositions"] = json!([
            {"type": "availability", "composition": {"type": "active"}},
            {"type": "lastActivity", "composition": {"lastActiveTime": "2024-05-01T10:00:00Z"}},
            {"type": "availability", "composition": {"unexpected": 1}},
            {"type": "availability", "composition": {"type": "dnd"}},
            {"type": "lastActivity", "composition": {}},
        ]);

        let record = PresenceRecord::from_event(&event).unwrap();
        assert_eq!(record.status, "active");
        assert_eq!(record.last_active, "2024-05-01T10:00:00Z");
    }

    #[test]
    fn test_record_wire_names() {
        let record = PresenceRecord::from_event(&userstate_event("person-a")).unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["expiresTTL"], 600);
        assert_eq!(value["statusTime"], "2024-05-01T10:00:00Z");
        assert_eq!(value["lastSeenDeviceUrl"], "");
    }
}
