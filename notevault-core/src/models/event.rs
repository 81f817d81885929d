//! Event envelope and payload shapes published by C6/C7 (§3, §6 "Event topics").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespaced event topics (`nv.object.*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Stored,
    Updated,
    Deleted,
    Versioned,
    Restored,
    Moved,
    Accessed,
    StorageFull,
}

impl Topic {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stored => "nv.object.stored",
            Self::Updated => "nv.object.updated",
            Self::Deleted => "nv.object.deleted",
            Self::Versioned => "nv.object.versioned",
            Self::Restored => "nv.object.restored",
            Self::Moved => "nv.object.moved",
            Self::Accessed => "nv.object.accessed",
            Self::StorageFull => "nv.object.storage.full",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Header carried by every published event (§3 "Event envelope (C4)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHeader {
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub version: u32,
}

impl EventHeader {
    #[must_use]
    pub fn new(topic: Topic) -> Self {
        Self {
            topic: topic.to_string(),
            trace_id: None,
            producer: None,
            occurred_at: Utc::now(),
            version: 1,
        }
    }

    #[must_use]
    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    #[must_use]
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }
}

/// `{ header, payload }` envelope, JSON-encoded on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub header: EventHeader,
    pub payload: T,
}

impl<T> EventEnvelope<T> {
    #[must_use]
    pub fn new(topic: Topic, payload: T) -> Self {
        Self {
            header: EventHeader::new(topic),
            payload,
        }
    }

    /// Outgoing message id; always fresh per publish (§4.4).
    #[must_use]
    pub fn message_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Where an access/copy/move originated, carried on [`ObjectEventPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Upload,
    Presigned,
    Move,
    Sync,
    Api,
}

/// Shared payload shape for every `nv.object.*` event (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEventPayload {
    pub bucket: String,
    pub object_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub source: EventSource,
    pub occurred_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_strings_are_namespaced() {
        assert_eq!(Topic::Stored.as_str(), "nv.object.stored");
        assert_eq!(Topic::StorageFull.as_str(), "nv.object.storage.full");
    }

    #[test]
    fn envelope_round_trips_through_json() {
        let payload = ObjectEventPayload {
            bucket: "default".to_string(),
            object_key: "u1/2025/09/a.md".to_string(),
            version_id: None,
            etag: Some("abc".to_string()),
            size: Some(42),
            content_type: Some("text/markdown".to_string()),
            file_name: Some("a.md".to_string()),
            source: EventSource::Upload,
            occurred_at: Utc::now(),
        };
        let env = EventEnvelope::new(Topic::Stored, payload);
        let json = serde_json::to_string(&env).unwrap();
        let decoded: EventEnvelope<ObjectEventPayload> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.header.topic, "nv.object.stored");
        assert_eq!(decoded.payload.object_key, "u1/2025/09/a.md");
    }

    #[test]
    fn message_ids_are_fresh() {
        assert_ne!(EventEnvelope::<()>::message_id(), EventEnvelope::<()>::message_id());
    }
}
