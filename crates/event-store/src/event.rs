use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AggregateId, EventStoreError, Result};

/// Identity of a single stored event, random per append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Count of events in one stream, checked on append.
///
/// An empty stream sits at 0. Appending moves it to 1, then 2, and so on
/// without gaps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of a stream nothing has been written to.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version carried by the opening event of a stream.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Slot of an event in the store-wide log.
///
/// Slots start at 1; `Position::start()` points before the oldest event and
/// is where a fresh reader begins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Position(u64);

impl Position {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn start() -> Self {
        Self(0)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A stored event: serialized payload plus where it lives.
///
/// `event_type` names the payload variant (`CampaignDeleted`,
/// `ChaosAddressEnabled`) and `aggregate_type` the owner of the stream
/// (`Campaign`, `Email`). Projections route on both without decoding the
/// payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: String,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// Stream version once this event is applied.
    pub version: Version,
    /// Zero until the store accepts the append and stamps the slot.
    #[serde(default)]
    pub position: Position,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    /// Correlation and causation ids, keyed by name.
    pub metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelope {
    pub fn builder() -> EventEnvelopeBuilder {
        EventEnvelopeBuilder::default()
    }

    /// Looks up a metadata entry that holds a JSON string.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key)?.as_str()
    }
}

/// Collects the parts of an [`EventEnvelope`]. Stream identity, version
/// and payload are mandatory; the timestamp falls back to now.
#[derive(Debug, Default)]
pub struct EventEnvelopeBuilder {
    event_type: Option<String>,
    aggregate_id: Option<AggregateId>,
    aggregate_type: Option<String>,
    version: Option<Version>,
    timestamp: Option<DateTime<Utc>>,
    payload: Option<serde_json::Value>,
    metadata: HashMap<String, serde_json::Value>,
}

impl EventEnvelopeBuilder {
    pub fn event_type(self, event_type: impl Into<String>) -> Self {
        Self {
            event_type: Some(event_type.into()),
            ..self
        }
    }

    pub fn aggregate_id(self, aggregate_id: AggregateId) -> Self {
        Self {
            aggregate_id: Some(aggregate_id),
            ..self
        }
    }

    pub fn aggregate_type(self, aggregate_type: impl Into<String>) -> Self {
        Self {
            aggregate_type: Some(aggregate_type.into()),
            ..self
        }
    }

    pub fn version(self, version: Version) -> Self {
        Self {
            version: Some(version),
            ..self
        }
    }

    pub fn timestamp(self, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            ..self
        }
    }

    /// Encodes `payload` as JSON. Fails only if serde rejects the value.
    pub fn payload<T: Serialize>(self, payload: &T) -> Result<Self> {
        let encoded = serde_json::to_value(payload)?;
        Ok(self.payload_raw(encoded))
    }

    pub fn payload_raw(self, payload: serde_json::Value) -> Self {
        Self {
            payload: Some(payload),
            ..self
        }
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Finishes the envelope. A missing mandatory part is reported as an
    /// invalid append naming the field.
    pub fn build(self) -> Result<EventEnvelope> {
        let require = |field: &str| EventStoreError::InvalidAppend(format!("envelope is missing {field}"));

        let event_type = self.event_type.ok_or_else(|| require("event_type"))?;
        let aggregate_id = self.aggregate_id.ok_or_else(|| require("aggregate_id"))?;
        let aggregate_type = self.aggregate_type.ok_or_else(|| require("aggregate_type"))?;
        let version = self.version.ok_or_else(|| require("version"))?;
        let payload = self.payload.ok_or_else(|| require("payload"))?;

        Ok(EventEnvelope {
            event_id: EventId::new(),
            event_type,
            aggregate_id,
            aggregate_type,
            version,
            position: Position::start(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            payload,
            metadata: self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_initial_and_first() {
        assert_eq!(Version::initial().as_i64(), 0);
        assert_eq!(Version::first().as_i64(), 1);
        assert_eq!(Version::initial().next(), Version::first());
    }

    #[test]
    fn position_orders_and_displays() {
        assert!(Position::start() < Position::start().next());
        assert_eq!(Position::new(7).to_string(), "#7");
    }

    #[test]
    fn builder_sets_every_field() {
        let aggregate_id = AggregateId::new();
        let payload = serde_json::json!({"local_part": "bounce"});

        let envelope = EventEnvelope::builder()
            .event_type("ChaosAddressCreated")
            .aggregate_id(aggregate_id)
            .aggregate_type("ChaosAddress")
            .version(Version::first())
            .payload_raw(payload.clone())
            .metadata("correlation_id", serde_json::json!("abc"))
            .build()
            .unwrap();

        assert_eq!(envelope.event_type, "ChaosAddressCreated");
        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.aggregate_type, "ChaosAddress");
        assert_eq!(envelope.version, Version::first());
        assert_eq!(envelope.position, Position::start());
        assert_eq!(envelope.payload, payload);
        assert_eq!(envelope.metadata_str("correlation_id"), Some("abc"));
    }

    #[test]
    fn builder_reports_missing_field() {
        let err = EventEnvelope::builder()
            .event_type("X")
            .aggregate_type("Y")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("aggregate_id"));
    }
}
