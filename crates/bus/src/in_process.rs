//! Synchronous in-process bus for single-node operation and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::envelope::{EventEnvelope, EventId};
use crate::error::BusError;
use crate::{EventHandler, MessageBus};

type SubscriptionKey = (String, String);

/// Dispatches events to matching handlers inline on the publisher's
/// task. A handler error is logged and the remaining handlers still
/// run; the publisher never observes it.
///
/// Keeps a history of published envelopes so tests can assert on
/// publication effects.
#[derive(Clone, Default)]
pub struct InProcessBus {
    subscriptions: Arc<RwLock<HashMap<SubscriptionKey, Vec<Arc<dyn EventHandler>>>>>,
    history: Arc<RwLock<Vec<EventEnvelope>>>,
}

impl InProcessBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every envelope published so far.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.history.read().unwrap().clone()
    }

    /// Returns the published envelopes matching `topic`/`routing_key`.
    pub fn published_on(&self, topic: &str, routing_key: &str) -> Vec<EventEnvelope> {
        self.history
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.topic == topic && e.routing_key == routing_key)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: serde_json::Value,
        causation_id: Option<Uuid>,
    ) -> Result<EventId, BusError> {
        let envelope = EventEnvelope::wrap(topic, routing_key, payload, causation_id);
        let event_id = envelope.event_id;

        self.history.write().unwrap().push(envelope.clone());

        // Snapshot the handler list before awaiting so the lock is not
        // held across handler execution.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscriptions
            .read()
            .unwrap()
            .get(&(topic.to_string(), routing_key.to_string()))
            .cloned()
            .unwrap_or_default();

        tracing::debug!(%event_id, subject = %envelope.subject(), "event published");

        for handler in handlers {
            if let Err(error) = handler.handle(&envelope).await {
                tracing::error!(
                    %event_id,
                    subject = %envelope.subject(),
                    %error,
                    "event handler failed"
                );
            }
        }

        Ok(event_id)
    }

    async fn subscribe(
        &self,
        topic: &str,
        routing_key: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BusError> {
        self.subscriptions
            .write()
            .unwrap()
            .entry((topic.to_string(), routing_key.to_string()))
            .or_default()
            .push(handler);
        tracing::debug!(topic, routing_key, "local subscription added");
        Ok(())
    }
}
