//! The order saga coordinator.

use std::future::Future;
use std::sync::{Arc, Mutex};

use bus::MessageBus;
use common::{OrderId, UserId};
use domain::{
    Order, OrderItem, OrderRepository, OrderStatus, ProductId, RepositoryError, ShippingAddress,
    UpdateFn,
};
use resilience::CircuitBreaker;

use crate::error::CoordinatorError;
use crate::events::{
    OrderCreatedItem, OrderCreatedPayload, OrderStatusUpdatedPayload, PaymentCompletedPayload,
    PaymentFailedPayload, ORDER_CREATED, ORDER_STATUS_UPDATED, ORDER_TOPIC,
};
use crate::services::inventory::InventoryService;
use crate::services::payment::PaymentService;
use crate::services::ServiceError;

/// A line item as submitted by the storefront. Prices are never taken
/// from the client; the saga fetches them from the product service.
#[derive(Debug, Clone)]
pub struct OrderItemRequest {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Input to [`OrderSagaCoordinator::create_order`].
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
}

/// Result of a successful create-order saga: the order in
/// `AwaitingPayment` plus the one-time confirmation handle the
/// storefront needs to complete the charge.
#[derive(Debug, Clone)]
pub struct CreateOrderOutcome {
    pub order: Order,
    pub confirmation_handle: String,
}

/// Drives the create-order saga and applies settlement outcomes.
///
/// Every call to the product service goes through the product breaker
/// and every call to the payment gateway through the payment breaker.
/// Business rejections from a healthy dependency (out of stock, card
/// declined) do not count as breaker failures; only transport faults do.
pub struct OrderSagaCoordinator<R, I, P> {
    repository: R,
    inventory: I,
    payment: P,
    bus: Arc<dyn MessageBus>,
    product_breaker: Arc<CircuitBreaker>,
    payment_breaker: Arc<CircuitBreaker>,
}

impl<R, I, P> OrderSagaCoordinator<R, I, P>
where
    R: OrderRepository,
    I: InventoryService,
    P: PaymentService,
{
    pub fn new(
        repository: R,
        inventory: I,
        payment: P,
        bus: Arc<dyn MessageBus>,
        product_breaker: Arc<CircuitBreaker>,
        payment_breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            repository,
            inventory,
            payment,
            bus,
            product_breaker,
            payment_breaker,
        }
    }

    pub fn product_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.product_breaker
    }

    pub fn payment_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.payment_breaker
    }

    pub(crate) fn repository(&self) -> &R {
        &self.repository
    }

    /// Runs the create-order saga.
    ///
    /// Steps: price every line item, persist the order, reserve stock
    /// item by item, open a payment intent, then publish
    /// `order.created` and hand the confirmation handle back. Any
    /// failure after the first granted reservation releases the granted
    /// reservations in reverse order and cancels the order.
    #[tracing::instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderOutcome, CoordinatorError> {
        metrics::counter!("orders_received_total").increment(1);

        if request.items.is_empty() {
            return Err(CoordinatorError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        for item in &request.items {
            if item.quantity == 0 {
                return Err(CoordinatorError::Validation(format!(
                    "quantity for product {} must be greater than zero",
                    item.product_id
                )));
            }
        }

        let mut items = Vec::with_capacity(request.items.len());
        for line in &request.items {
            let info = self
                .guarded(
                    &self.product_breaker,
                    self.inventory.fetch_product(&line.product_id),
                )
                .await?;
            items.push(OrderItem::new(
                line.product_id.clone(),
                line.quantity,
                info.price,
            ));
        }

        let order = Order::new(request.user_id, items, request.shipping_address)?;
        let order_id = order.id();
        self.repository.save(&order).await?;
        tracing::info!(%order_id, total = %order.total_amount(), "order accepted, reserving stock");

        let mut granted: Vec<(ProductId, u32)> = Vec::new();
        for item in order.items() {
            match self
                .guarded(
                    &self.product_breaker,
                    self.inventory.reserve(&item.product_id, item.quantity),
                )
                .await
            {
                Ok(_) => granted.push((item.product_id.clone(), item.quantity)),
                Err(error) => {
                    tracing::warn!(%order_id, product_id = %item.product_id, %error, "reservation failed, compensating");
                    self.compensate(order_id, &granted).await?;
                    return Err(error);
                }
            }
        }

        let (order, _) = self.apply_transition(order_id, OrderStatus::Reserved).await?;

        let intent = match self
            .guarded(
                &self.payment_breaker,
                self.payment.create_intent(order_id, order.total_amount()),
            )
            .await
        {
            Ok(intent) => intent,
            Err(error) => {
                tracing::warn!(%order_id, %error, "payment intent failed, compensating");
                self.compensate(order_id, &granted).await?;
                return Err(error);
            }
        };

        let intent_id = intent.intent_id.clone();
        let order = self
            .repository
            .atomic_update(
                order_id,
                Box::new(move |o| {
                    o.assign_payment_intent(intent_id)?;
                    o.transition_to(OrderStatus::AwaitingPayment)
                }),
            )
            .await?;

        let payload = OrderCreatedPayload {
            order_id,
            user_id: order.user_id(),
            total_amount: order.total_amount(),
            items: order
                .items()
                .map(|i| OrderCreatedItem {
                    product_id: i.product_id.clone(),
                    quantity: i.quantity,
                    unit_price: i.unit_price,
                })
                .collect(),
        };
        self.bus
            .publish(
                ORDER_TOPIC,
                ORDER_CREATED,
                serde_json::to_value(&payload)?,
                Some(order_id.as_uuid()),
            )
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(%order_id, intent_id = %intent.intent_id, "order awaiting payment");

        Ok(CreateOrderOutcome {
            order,
            confirmation_handle: intent.confirmation_handle,
        })
    }

    /// Loads an order.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, CoordinatorError> {
        self.repository
            .load(order_id)
            .await?
            .ok_or_else(|| CoordinatorError::NotFound(format!("order {order_id}")))
    }

    /// Applies an admin-driven fulfillment transition.
    ///
    /// Only forward moves along the state machine are accepted;
    /// cancellation has its own entry point because it compensates.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order, CoordinatorError> {
        if new_status == OrderStatus::Cancelled {
            return Err(CoordinatorError::Conflict(
                "use the cancel operation to cancel an order".to_string(),
            ));
        }

        let (order, previous) = self.apply_transition(order_id, new_status).await?;
        self.publish_status_updated(&order, previous).await?;
        tracing::info!(%order_id, from = %previous, to = %new_status, "order status updated");
        Ok(order)
    }

    /// Cancels an order that has not yet been confirmed, releasing any
    /// stock it holds.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order, CoordinatorError> {
        let (order, previous) = self.apply_transition(order_id, OrderStatus::Cancelled).await?;

        // Stock is held from the first granted reservation until the
        // order is confirmed.
        if matches!(previous, OrderStatus::Reserved | OrderStatus::AwaitingPayment) {
            let items: Vec<(ProductId, u32)> = order
                .items()
                .map(|i| (i.product_id.clone(), i.quantity))
                .collect();
            self.release_reservations(&items).await;
        }

        self.publish_status_updated(&order, previous).await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, from = %previous, "order cancelled");
        Ok(order)
    }

    /// Applies a `payment.completed` event.
    ///
    /// Idempotent under at-least-once delivery: the confirming
    /// transition runs atomically against the stored status, so a
    /// duplicate delivery (or one racing a cancellation) is dropped
    /// without effect and without a second `order.status.updated`.
    #[tracing::instrument(skip(self, payload), fields(order_id = %payload.order_id))]
    pub async fn on_payment_completed(
        &self,
        payload: PaymentCompletedPayload,
    ) -> Result<(), CoordinatorError> {
        match self
            .apply_transition(payload.order_id, OrderStatus::Confirmed)
            .await
        {
            Ok((order, previous)) => {
                self.publish_status_updated(&order, previous).await?;
                metrics::counter!("payments_completed_total").increment(1);
                tracing::info!(payment_id = %payload.payment_id, "order confirmed");
                Ok(())
            }
            Err(CoordinatorError::NotFound(_)) => {
                tracing::warn!(payment_id = %payload.payment_id, "payment completed for unknown order, dropped");
                Ok(())
            }
            Err(CoordinatorError::Conflict(reason)) => {
                tracing::info!(payment_id = %payload.payment_id, %reason, "stale or duplicate payment completion ignored");
                Ok(())
            }
            Err(other) => Err(other),
        }
    }

    /// Applies a `payment.failed` event: cancels the order and returns
    /// its stock, but only if it is still awaiting payment. Idempotent
    /// for the same reason as [`Self::on_payment_completed`].
    #[tracing::instrument(skip(self, payload), fields(order_id = %payload.order_id))]
    pub async fn on_payment_failed(
        &self,
        payload: PaymentFailedPayload,
    ) -> Result<(), CoordinatorError> {
        let result = self
            .repository
            .atomic_update(
                payload.order_id,
                Box::new(|o| {
                    // A failed settlement only ever cancels an order
                    // that is waiting on it.
                    if o.status() != OrderStatus::AwaitingPayment {
                        return Err(domain::DomainError::InvalidStatusTransition {
                            from: o.status(),
                            to: OrderStatus::Cancelled,
                        });
                    }
                    o.transition_to(OrderStatus::Cancelled)
                }),
            )
            .await;

        match result {
            Ok(order) => {
                let items: Vec<(ProductId, u32)> = order
                    .items()
                    .map(|i| (i.product_id.clone(), i.quantity))
                    .collect();
                self.release_reservations(&items).await;
                self.publish_status_updated(&order, OrderStatus::AwaitingPayment)
                    .await?;
                metrics::counter!("payments_failed_total").increment(1);
                tracing::warn!(
                    payment_id = %payload.payment_id,
                    error = %payload.error,
                    "payment failed, order cancelled"
                );
                Ok(())
            }
            Err(RepositoryError::NotFound(_)) => {
                tracing::warn!(payment_id = %payload.payment_id, "payment failure for unknown order, dropped");
                Ok(())
            }
            Err(RepositoryError::Domain(_)) => {
                tracing::info!(payment_id = %payload.payment_id, "stale or duplicate payment failure ignored");
                Ok(())
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Runs `call` under `breaker`, recording the outcome.
    async fn guarded<T, F>(
        &self,
        breaker: &CircuitBreaker,
        call: F,
    ) -> Result<T, CoordinatorError>
    where
        F: Future<Output = Result<T, ServiceError>>,
    {
        if !breaker.can_execute() {
            metrics::counter!(
                "circuit_breaker_fast_fails_total",
                "dependency" => breaker.dependency().to_string()
            )
            .increment(1);
            return Err(CoordinatorError::ServiceUnavailable(format!(
                "{} circuit is open",
                breaker.dependency()
            )));
        }

        match call.await {
            Ok(value) => {
                breaker.on_success();
                Ok(value)
            }
            Err(error) => {
                if error.is_unavailable() {
                    breaker.on_failure();
                } else {
                    // The dependency answered; a business rejection is
                    // proof of health.
                    breaker.on_success();
                }
                Err(error.into())
            }
        }
    }

    /// Releases granted reservations in reverse order and cancels the
    /// order. Release failures are logged, never propagated; the saga's
    /// outcome is already decided.
    async fn compensate(
        &self,
        order_id: OrderId,
        granted: &[(ProductId, u32)],
    ) -> Result<(), CoordinatorError> {
        self.release_reservations(granted).await;
        let (order, previous) = self.apply_transition(order_id, OrderStatus::Cancelled).await?;
        self.publish_status_updated(&order, previous).await?;
        metrics::counter!("saga_compensations_total").increment(1);
        Ok(())
    }

    async fn release_reservations(&self, granted: &[(ProductId, u32)]) {
        for (product_id, quantity) in granted.iter().rev() {
            if let Err(error) = self.inventory.release(product_id, *quantity).await {
                tracing::error!(%product_id, quantity, %error, "failed to release reservation");
            }
        }
    }

    /// Transitions the order atomically and returns the updated order
    /// together with the status it moved from.
    async fn apply_transition(
        &self,
        order_id: OrderId,
        next: OrderStatus,
    ) -> Result<(Order, OrderStatus), CoordinatorError> {
        let previous = Arc::new(Mutex::new(None));
        let slot = previous.clone();
        let update: UpdateFn = Box::new(move |order| {
            *slot.lock().unwrap() = Some(order.status());
            order.transition_to(next)
        });
        let order = self.repository.atomic_update(order_id, update).await?;
        let previous = previous
            .lock()
            .unwrap()
            .unwrap_or(OrderStatus::Pending);
        Ok((order, previous))
    }

    async fn publish_status_updated(
        &self,
        order: &Order,
        previous: OrderStatus,
    ) -> Result<(), CoordinatorError> {
        let payload = OrderStatusUpdatedPayload {
            order_id: order.id(),
            status: order.status(),
            previous_status: previous,
        };
        self.bus
            .publish(
                ORDER_TOPIC,
                ORDER_STATUS_UPDATED,
                serde_json::to_value(&payload)?,
                Some(order.id().as_uuid()),
            )
            .await?;
        Ok(())
    }
}
