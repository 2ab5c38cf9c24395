//! Event envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A domain event as it travels on the bus.
///
/// Ephemeral: survives process restart only as far as the broker's own
/// durability carries it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID, generated at publish time.
    pub event_id: EventId,
    /// Topic the event was published to, e.g. "payment.events".
    pub topic: String,
    /// Routing key within the topic, e.g. "payment.completed".
    pub routing_key: String,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
    /// ID of the order or intent this event concerns, if any.
    pub causation_id: Option<Uuid>,
    /// Domain-specific payload.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wraps a payload with a fresh event ID and timestamp.
    pub fn wrap(
        topic: impl Into<String>,
        routing_key: impl Into<String>,
        payload: serde_json::Value,
        causation_id: Option<Uuid>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            topic: topic.into(),
            routing_key: routing_key.into(),
            timestamp: Utc::now(),
            causation_id,
            payload,
        }
    }

    /// Returns the broker subject for this envelope, `topic.routing_key`.
    pub fn subject(&self) -> String {
        format!("{}.{}", self.topic, self.routing_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_assigns_unique_ids() {
        let a = EventEnvelope::wrap("order.events", "order.created", serde_json::json!({}), None);
        let b = EventEnvelope::wrap("order.events", "order.created", serde_json::json!({}), None);
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn test_subject() {
        let envelope = EventEnvelope::wrap(
            "payment.events",
            "payment.completed",
            serde_json::json!({}),
            None,
        );
        assert_eq!(envelope.subject(), "payment.events.payment.completed");
    }

    #[test]
    fn test_serialization_roundtrip() {
        let causation = Uuid::new_v4();
        let envelope = EventEnvelope::wrap(
            "order.events",
            "order.status.updated",
            serde_json::json!({"status": "Confirmed"}),
            Some(causation),
        );

        let json = serde_json::to_string(&envelope).unwrap();
        let deserialized: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(envelope, deserialized);
        assert_eq!(deserialized.causation_id, Some(causation));
    }
}
