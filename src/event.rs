//! Event and body types
//!
//! An [`Event`] is one recorded occurrence: a name, a UTC timestamp, and a
//! free-form attribute [`Body`]. The serialized form is identical on disk
//! and on the wire:
//!
//! ```json
//! {"ts":"2026-08-07T12:00:00Z","event":"cli:deploy","body":{"env":"prod"}}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One recorded occurrence, immutable once appended to the journal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// When the event was recorded
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,

    /// Event name, already carrying any configured prefix
    #[serde(rename = "event")]
    pub name: String,

    /// Attributes of the event
    pub body: Body,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn now(name: impl Into<String>, body: Body) -> Self {
        Event {
            timestamp: Utc::now(),
            name: name.into(),
            body,
        }
    }
}

/// The attribute mapping surrounding an event.
///
/// Also used for the instance-wide global field overlay merged into every
/// tracked event. Not safe for concurrent mutation; a `Body` belongs to one
/// writer at a time, like the rest of the instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Body(Map<String, Value>);

impl Body {
    /// Create an empty body
    pub fn new() -> Self {
        Body(Map::new())
    }

    /// Set a field, consuming and returning the body for chaining:
    ///
    /// ```
    /// use siphon::Body;
    /// let body = Body::new().set("env", "prod").set("attempt", 2);
    /// ```
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set a field in place
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether a field is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the body has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Copy every field of `defaults` that this body does not already
    /// define. Existing keys always win.
    pub fn merge_missing(&mut self, defaults: &Body) {
        for (key, value) in &defaults.0 {
            if !self.0.contains_key(key) {
                self.0.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_set_chaining() {
        let body = Body::new().set("env", "prod").set("attempt", 2);
        assert_eq!(body.len(), 2);
        assert_eq!(body.get("env"), Some(&Value::from("prod")));
        assert_eq!(body.get("attempt"), Some(&Value::from(2)));
    }

    #[test]
    fn test_merge_missing_keeps_existing_keys() {
        let mut body = Body::new().set("env", "dev");
        let globals = Body::new().set("env", "prod").set("version", "1.2.3");

        body.merge_missing(&globals);

        assert_eq!(body.get("env"), Some(&Value::from("dev")));
        assert_eq!(body.get("version"), Some(&Value::from("1.2.3")));
    }

    #[test]
    fn test_merge_missing_into_empty_body() {
        let mut body = Body::new();
        let globals = Body::new().set("env", "prod");

        body.merge_missing(&globals);

        assert_eq!(body.get("env"), Some(&Value::from("prod")));
    }

    #[test]
    fn test_event_wire_field_names() {
        let event = Event {
            timestamp: "2026-08-07T12:00:00Z".parse().unwrap(),
            name: "cli:deploy".to_string(),
            body: Body::new().set("env", "prod"),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["ts"], "2026-08-07T12:00:00Z");
        assert_eq!(json["event"], "cli:deploy");
        assert_eq!(json["body"]["env"], "prod");
    }

    #[test]
    fn test_event_round_trip() {
        let event = Event::now("cli:deploy", Body::new().set("ok", true));
        let encoded = serde_json::to_string(&event).unwrap();
        let decoded: Event = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, event);
    }
}
