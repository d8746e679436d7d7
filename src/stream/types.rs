//! Change Stream Data Types
//!
//! Wire and in-memory shapes for the change-data-capture stream: typed attribute
//! values, stored records, and the change notifications that wrap them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Field holding the lifecycle status in every record generation.
pub const STATUS_FIELD: &str = "status";

/// A typed attribute value as carried by the stream and stored in the table.
///
/// Serialized externally tagged, e.g. `{"S": "doc1"}` or `{"N": "42"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    /// Numbers travel as strings to keep full precision.
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "M")]
    M(HashMap<String, AttributeValue>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    /// Base64 encoded binary.
    #[serde(rename = "B")]
    B(String),
    #[serde(rename = "BS")]
    Bs(Vec<String>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            AttributeValue::N(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::N(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, AttributeValue>> {
        match self {
            AttributeValue::M(map) => Some(map),
            _ => None,
        }
    }
}

/// A stored row: field name to typed value.
///
/// The schema varies across record generations (legacy flat `id` key or the
/// composite `fileId` + `uploadedBy` key), so no field is structurally required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub HashMap<String, AttributeValue>);

impl RawRecord {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.0.get(field)
    }

    /// Returns a string field, treating empty strings as absent.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(AttributeValue::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn get_u64(&self, field: &str) -> Option<u64> {
        self.0.get(field).and_then(AttributeValue::as_u64)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(AttributeValue::as_f64)
    }

    /// The raw lifecycle status string, if the record carries one.
    pub fn status(&self) -> Option<&str> {
        self.get_str(STATUS_FIELD)
    }

    pub fn set(&mut self, field: &str, value: AttributeValue) {
        self.0.insert(field.to_string(), value);
    }

    pub fn set_str(&mut self, field: &str, value: impl Into<String>) {
        self.set(field, AttributeValue::S(value.into()));
    }

    pub fn remove(&mut self, field: &str) -> Option<AttributeValue> {
        self.0.remove(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// The kind of row change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Insert,
    Modify,
    Remove,
    /// Any event name this service does not know about.
    #[serde(other)]
    Other,
}

/// Before/after images attached to a stream record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys: Option<RawRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<RawRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<RawRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<String>,
}

/// One notification as delivered on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(rename = "eventName")]
    pub event_name: EventType,
    #[serde(rename = "eventSource", default, skip_serializing_if = "Option::is_none")]
    pub event_source: Option<String>,
    #[serde(default)]
    pub dynamodb: StreamImages,
}

/// One entry of a batch's `Records` array.
///
/// Entries that do not match the notification shape are kept raw, so a single
/// bad entry never rejects its siblings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireRecord {
    Decoded(StreamRecord),
    Undecodable(serde_json::Value),
}

/// A batch of notifications, as handed to one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamBatch {
    #[serde(rename = "Records", default)]
    pub records: Vec<WireRecord>,
}

/// A batch split into usable events and the entries that failed to decode.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<ChangeEvent>,
    /// One message per undecodable entry.
    pub failures: Vec<String>,
}

impl StreamBatch {
    pub fn from_events(events: impl IntoIterator<Item = ChangeEvent>) -> Self {
        Self {
            records: events
                .into_iter()
                .map(|event| WireRecord::Decoded(event.into()))
                .collect(),
        }
    }

    pub fn decode(self) -> DecodedBatch {
        let mut decoded = DecodedBatch::default();

        for (index, record) in self.records.into_iter().enumerate() {
            match record {
                WireRecord::Decoded(record) => decoded.events.push(record.into()),
                WireRecord::Undecodable(raw) => {
                    let event_id = raw
                        .get("eventID")
                        .and_then(|id| id.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("#{}", index));
                    let reason = serde_json::from_value::<StreamRecord>(raw)
                        .err()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unrecognized record".to_string());
                    tracing::warn!("Skipping undecodable stream record {}: {}", event_id, reason);
                    decoded
                        .failures
                        .push(format!("record {}: undecodable: {}", event_id, reason));
                }
            }
        }

        decoded
    }
}

/// A single row change, decoupled from the wire envelope.
///
/// Ephemeral: one per stream notification, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub event_id: Option<String>,
    pub event_type: EventType,
    /// Empty when the notification carried no new image (REMOVE).
    pub new_image: RawRecord,
    pub old_image: Option<RawRecord>,
}

impl ChangeEvent {
    pub fn insert(new_image: RawRecord) -> Self {
        Self {
            event_id: Some(uuid::Uuid::new_v4().to_string()),
            event_type: EventType::Insert,
            new_image,
            old_image: None,
        }
    }

    pub fn modify(old_image: RawRecord, new_image: RawRecord) -> Self {
        Self {
            event_id: Some(uuid::Uuid::new_v4().to_string()),
            event_type: EventType::Modify,
            new_image,
            old_image: Some(old_image),
        }
    }
}

impl From<StreamRecord> for ChangeEvent {
    fn from(record: StreamRecord) -> Self {
        Self {
            event_id: record.event_id,
            event_type: record.event_name,
            new_image: record.dynamodb.new_image.unwrap_or_default(),
            old_image: record.dynamodb.old_image,
        }
    }
}

impl From<ChangeEvent> for StreamRecord {
    fn from(event: ChangeEvent) -> Self {
        Self {
            event_id: event.event_id,
            event_name: event.event_type,
            event_source: None,
            dynamodb: StreamImages {
                keys: None,
                new_image: (!event.new_image.is_empty()).then_some(event.new_image),
                old_image: event.old_image,
                sequence_number: None,
            },
        }
    }
}
