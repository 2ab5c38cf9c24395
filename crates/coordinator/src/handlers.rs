//! Bus subscriptions for payment settlement events.

use std::sync::Arc;

use async_trait::async_trait;
use bus::{BusError, EventEnvelope, EventHandler, MessageBus};
use domain::OrderRepository;

use crate::coordinator::OrderSagaCoordinator;
use crate::events::{
    PaymentCompletedPayload, PaymentFailedPayload, PAYMENT_COMPLETED, PAYMENT_FAILED,
    PAYMENT_TOPIC,
};
use crate::services::inventory::InventoryService;
use crate::services::payment::PaymentService;

/// Confirms orders when the gateway reports a settled charge.
pub struct PaymentCompletedHandler<R, I, P> {
    coordinator: Arc<OrderSagaCoordinator<R, I, P>>,
}

#[async_trait]
impl<R, I, P> EventHandler for PaymentCompletedHandler<R, I, P>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    async fn handle(&self, event: &EventEnvelope) -> Result<(), BusError> {
        let payload: PaymentCompletedPayload = serde_json::from_value(event.payload.clone())?;
        self.coordinator
            .on_payment_completed(payload)
            .await
            .map_err(|e| BusError::Handler(e.to_string()))
    }
}

/// Cancels and compensates orders when the gateway gives up.
pub struct PaymentFailedHandler<R, I, P> {
    coordinator: Arc<OrderSagaCoordinator<R, I, P>>,
}

#[async_trait]
impl<R, I, P> EventHandler for PaymentFailedHandler<R, I, P>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    async fn handle(&self, event: &EventEnvelope) -> Result<(), BusError> {
        let payload: PaymentFailedPayload = serde_json::from_value(event.payload.clone())?;
        self.coordinator
            .on_payment_failed(payload)
            .await
            .map_err(|e| BusError::Handler(e.to_string()))
    }
}

/// Wires the coordinator's settlement handlers onto the bus.
pub async fn subscribe_payment_events<R, I, P>(
    coordinator: Arc<OrderSagaCoordinator<R, I, P>>,
    bus: &dyn MessageBus,
) -> Result<(), BusError>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    bus.subscribe(
        PAYMENT_TOPIC,
        PAYMENT_COMPLETED,
        Arc::new(PaymentCompletedHandler {
            coordinator: coordinator.clone(),
        }),
    )
    .await?;
    bus.subscribe(
        PAYMENT_TOPIC,
        PAYMENT_FAILED,
        Arc::new(PaymentFailedHandler { coordinator }),
    )
    .await
}
