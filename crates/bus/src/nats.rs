//! NATS-backed bus for cross-process delivery.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use uuid::Uuid;

use crate::envelope::{EventEnvelope, EventId};
use crate::error::BusError;
use crate::{EventHandler, MessageBus};

/// Connection and retry settings for [`NatsBus`].
#[derive(Debug, Clone)]
pub struct NatsBusConfig {
    /// NATS server URL, e.g. "nats://localhost:4222".
    pub url: String,
    /// How many times a failing handler is retried per delivery before
    /// the event is dropped with an error log.
    pub max_handler_retries: u32,
}

impl Default for NatsBusConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            max_handler_retries: 3,
        }
    }
}

/// Bus riding a NATS broker.
///
/// Events travel on the subject `"{topic}.{routing_key}"`. Each
/// subscription runs in its own task; a failing handler is retried up
/// to `max_handler_retries` times and then the delivery is dropped with
/// an error log. Durable dead-lettering is a JetStream concern and is
/// not wired here.
pub struct NatsBus {
    client: async_nats::Client,
    max_handler_retries: u32,
}

impl NatsBus {
    /// Connects to the broker.
    pub async fn connect(config: NatsBusConfig) -> Result<Self, BusError> {
        let client = async_nats::connect(&config.url)
            .await
            .map_err(|e| BusError::Broker(e.to_string()))?;
        tracing::info!(url = %config.url, "connected to NATS");
        Ok(Self {
            client,
            max_handler_retries: config.max_handler_retries,
        })
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: serde_json::Value,
        causation_id: Option<Uuid>,
    ) -> Result<EventId, BusError> {
        let envelope = EventEnvelope::wrap(topic, routing_key, payload, causation_id);
        let event_id = envelope.event_id;
        let subject = envelope.subject();
        let bytes = serde_json::to_vec(&envelope)?;

        self.client
            .publish(subject.clone(), bytes.into())
            .await
            .map_err(|e| BusError::Broker(e.to_string()))?;

        tracing::debug!(%event_id, %subject, "event published");
        Ok(event_id)
    }

    async fn subscribe(
        &self,
        topic: &str,
        routing_key: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BusError> {
        let subject = format!("{topic}.{routing_key}");
        let mut subscription = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| BusError::Broker(e.to_string()))?;

        let max_retries = self.max_handler_retries;
        tokio::spawn(async move {
            while let Some(message) = subscription.next().await {
                let envelope: EventEnvelope = match serde_json::from_slice(&message.payload) {
                    Ok(envelope) => envelope,
                    Err(error) => {
                        tracing::error!(subject = %message.subject, %error, "malformed event dropped");
                        continue;
                    }
                };

                let mut attempt = 0;
                loop {
                    match handler.handle(&envelope).await {
                        Ok(()) => break,
                        Err(error) if attempt < max_retries => {
                            attempt += 1;
                            tracing::warn!(
                                event_id = %envelope.event_id,
                                subject = %envelope.subject(),
                                attempt,
                                %error,
                                "event handler failed, retrying"
                            );
                        }
                        Err(error) => {
                            tracing::error!(
                                event_id = %envelope.event_id,
                                subject = %envelope.subject(),
                                %error,
                                "event handler failed, delivery dropped"
                            );
                            break;
                        }
                    }
                }
            }
        });

        tracing::info!(%subject, "subscribed");
        Ok(())
    }
}
