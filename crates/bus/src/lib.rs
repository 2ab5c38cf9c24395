//! Domain event bus.
//!
//! Carries events between the order, product, and payment domains on
//! `topic` / `routing_key` channels (e.g. `payment.events` /
//! `payment.completed`). Delivery is at-least-once: a handler may see
//! the same event ID again after a transient failure, so handlers must
//! be idempotent. Two implementations exist behind the trait:
//! [`InProcessBus`] dispatches synchronously inside one process,
//! [`NatsBus`] rides a NATS broker for cross-process delivery. The
//! choice is made once at startup by configuration.

pub mod envelope;
pub mod error;
pub mod in_process;
pub mod nats;

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

pub use envelope::{EventEnvelope, EventId};
pub use error::BusError;
pub use in_process::InProcessBus;
pub use nats::{NatsBus, NatsBusConfig};

/// Handler invoked once per matching published event.
///
/// Errors are logged and never propagate to the publisher or other
/// subscribers; the broker-backed bus retries a bounded number of
/// times before dropping the delivery.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &EventEnvelope) -> Result<(), BusError>;
}

/// Publish-subscribe channel for domain events.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Wraps `payload` in an envelope with a fresh event ID and
    /// timestamp and delivers it to `topic`/`routing_key`. Returns the
    /// generated event ID. `causation_id` ties the event back to the
    /// order or intent it concerns.
    async fn publish(
        &self,
        topic: &str,
        routing_key: &str,
        payload: serde_json::Value,
        causation_id: Option<Uuid>,
    ) -> Result<EventId, BusError>;

    /// Registers `handler` for events published to `topic`/`routing_key`.
    async fn subscribe(
        &self,
        topic: &str,
        routing_key: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BusError>;
}
