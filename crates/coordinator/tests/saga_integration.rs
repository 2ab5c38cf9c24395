//! End-to-end saga tests against the in-memory repository, services,
//! and bus.

use std::sync::Arc;
use std::time::Duration;

use bus::{InProcessBus, MessageBus};
use common::UserId;
use coordinator::events::{
    PaymentCompletedPayload, PaymentFailedPayload, ORDER_CREATED, ORDER_STATUS_UPDATED,
    ORDER_TOPIC, PAYMENT_COMPLETED, PAYMENT_FAILED, PAYMENT_TOPIC,
};
use coordinator::{
    subscribe_payment_events, CoordinatorError, CreateOrderRequest, InMemoryInventoryService,
    InMemoryPaymentService, OrderItemRequest, OrderSagaCoordinator,
};
use domain::{InMemoryOrderRepository, Money, OrderRepository, OrderStatus, ProductId};
use resilience::{BreakerState, CircuitBreaker};

type TestCoordinator =
    OrderSagaCoordinator<InMemoryOrderRepository, InMemoryInventoryService, InMemoryPaymentService>;

struct Harness {
    coordinator: Arc<TestCoordinator>,
    repository: InMemoryOrderRepository,
    inventory: InMemoryInventoryService,
    payment: InMemoryPaymentService,
    bus: Arc<InProcessBus>,
}

fn harness() -> Harness {
    harness_with_breakers(5, Duration::from_secs(60))
}

fn harness_with_breakers(threshold: u32, reset_timeout: Duration) -> Harness {
    let repository = InMemoryOrderRepository::new();
    let inventory = InMemoryInventoryService::new();
    let payment = InMemoryPaymentService::new();
    let bus = Arc::new(InProcessBus::new());

    let coordinator = Arc::new(OrderSagaCoordinator::new(
        repository.clone(),
        inventory.clone(),
        payment.clone(),
        bus.clone(),
        Arc::new(CircuitBreaker::new("product", threshold, reset_timeout)),
        Arc::new(CircuitBreaker::new("payment", threshold, reset_timeout)),
    ));

    Harness {
        coordinator,
        repository,
        inventory,
        payment,
        bus,
    }
}

fn address() -> domain::ShippingAddress {
    domain::ShippingAddress {
        line1: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        postal_code: "12345".to_string(),
        country: "US".to_string(),
    }
}

fn request(items: Vec<(&str, u32)>) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: UserId::new(),
        items: items
            .into_iter()
            .map(|(sku, quantity)| OrderItemRequest {
                product_id: ProductId::new(sku),
                quantity,
            })
            .collect(),
        shipping_address: address(),
    }
}

#[tokio::test]
async fn test_happy_path_reaches_awaiting_payment() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    h.inventory.set_stock("SKU-002", Money::from_cents(2500), 5);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 2), ("SKU-002", 1)]))
        .await
        .unwrap();

    assert_eq!(outcome.order.status(), OrderStatus::AwaitingPayment);
    assert_eq!(outcome.order.total_amount().cents(), 4500);
    assert!(outcome.order.payment_intent_id().is_some());
    assert!(!outcome.confirmation_handle.is_empty());

    // Stock decremented, intent recorded, creation event published.
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(8));
    assert_eq!(h.inventory.available(&ProductId::new("SKU-002")), Some(4));
    assert_eq!(h.payment.intent_count(), 1);
    assert_eq!(h.bus.published_on(ORDER_TOPIC, ORDER_CREATED).len(), 1);
}

#[tokio::test]
async fn test_prices_come_from_catalog_not_client() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(999), 10);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 3)]))
        .await
        .unwrap();

    assert_eq!(outcome.order.total_amount().cents(), 2997);
    let intent_id = outcome.order.payment_intent_id().unwrap();
    let (_, amount) = h.payment.intent(intent_id).unwrap();
    assert_eq!(amount.cents(), 2997);
}

#[tokio::test]
async fn test_empty_order_rejected_before_any_side_effect() {
    let h = harness();
    let error = h.coordinator.create_order(request(vec![])).await.unwrap_err();
    assert!(matches!(error, CoordinatorError::Validation(_)));
    assert_eq!(h.payment.intent_count(), 0);
    assert!(h.bus.published().is_empty());
}

#[tokio::test]
async fn test_unknown_product_fails_with_not_found() {
    let h = harness();
    let error = h
        .coordinator
        .create_order(request(vec![("SKU-404", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(error, CoordinatorError::NotFound(_)));
}

#[tokio::test]
async fn test_partial_reservation_failure_compensates() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    h.inventory.set_stock("SKU-002", Money::from_cents(2000), 0);

    let error = h
        .coordinator
        .create_order(request(vec![("SKU-001", 2), ("SKU-002", 1)]))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        CoordinatorError::InsufficientInventory { .. }
    ));
    // The granted SKU-001 reservation was released.
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
    assert_eq!(h.payment.intent_count(), 0);

    // The order exists and is cancelled, with the cancellation visible
    // on the bus.
    let orders = h
        .repository
        .list_by_status(OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(
        h.bus.published_on(ORDER_TOPIC, ORDER_STATUS_UPDATED).len(),
        1
    );
}

#[tokio::test]
async fn test_payment_intent_outage_compensates_and_releases_stock() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    h.payment.set_unavailable(true);

    let error = h
        .coordinator
        .create_order(request(vec![("SKU-001", 4)]))
        .await
        .unwrap_err();

    assert!(matches!(error, CoordinatorError::ServiceUnavailable(_)));
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
    let orders = h
        .repository
        .list_by_status(OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn test_gateway_rejection_maps_to_payment_error_not_outage() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    h.payment.set_reject(true);

    let error = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap_err();

    assert!(matches!(error, CoordinatorError::Payment(_)));
    // A business rejection is proof of gateway health.
    assert_eq!(
        h.coordinator.payment_breaker().snapshot().state,
        BreakerState::Closed
    );
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
}

#[tokio::test]
async fn test_product_breaker_opens_and_fails_fast() {
    let h = harness_with_breakers(2, Duration::from_secs(60));
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    h.inventory.set_unavailable(true);

    for _ in 0..2 {
        let error = h
            .coordinator
            .create_order(request(vec![("SKU-001", 1)]))
            .await
            .unwrap_err();
        assert!(matches!(error, CoordinatorError::ServiceUnavailable(_)));
    }
    assert_eq!(
        h.coordinator.product_breaker().snapshot().state,
        BreakerState::Open
    );

    // The service recovers but the breaker still rejects until the
    // reset timeout elapses.
    h.inventory.set_unavailable(false);
    let error = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap_err();
    assert!(matches!(error, CoordinatorError::ServiceUnavailable(_)));
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
}

#[tokio::test]
async fn test_product_breaker_recovers_through_half_open_trial() {
    let h = harness_with_breakers(1, Duration::from_millis(20));
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    h.inventory.set_unavailable(true);
    let _ = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap_err();
    assert_eq!(
        h.coordinator.product_breaker().snapshot().state,
        BreakerState::Open
    );

    h.inventory.set_unavailable(false);
    tokio::time::sleep(Duration::from_millis(30)).await;

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();
    assert_eq!(outcome.order.status(), OrderStatus::AwaitingPayment);
    assert_eq!(
        h.coordinator.product_breaker().snapshot().state,
        BreakerState::Closed
    );
}

#[tokio::test]
async fn test_payment_completed_confirms_order() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    subscribe_payment_events(h.coordinator.clone(), h.bus.as_ref())
        .await
        .unwrap();

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();
    let order_id = outcome.order.id();
    let intent_id = outcome.order.payment_intent_id().unwrap().to_string();

    let payload = PaymentCompletedPayload {
        payment_id: "pay_001".to_string(),
        order_id,
        payment_intent_id: intent_id,
        amount: outcome.order.total_amount(),
    };
    h.bus
        .publish(
            PAYMENT_TOPIC,
            PAYMENT_COMPLETED,
            serde_json::to_value(&payload).unwrap(),
            None,
        )
        .await
        .unwrap();

    let order = h.coordinator.get_order(order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Confirmed);
    assert_eq!(
        h.bus.published_on(ORDER_TOPIC, ORDER_STATUS_UPDATED).len(),
        1
    );
}

#[tokio::test]
async fn test_duplicate_payment_completed_is_idempotent() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    subscribe_payment_events(h.coordinator.clone(), h.bus.as_ref())
        .await
        .unwrap();

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();
    let payload = PaymentCompletedPayload {
        payment_id: "pay_001".to_string(),
        order_id: outcome.order.id(),
        payment_intent_id: outcome.order.payment_intent_id().unwrap().to_string(),
        amount: outcome.order.total_amount(),
    };
    let value = serde_json::to_value(&payload).unwrap();

    for _ in 0..3 {
        h.bus
            .publish(PAYMENT_TOPIC, PAYMENT_COMPLETED, value.clone(), None)
            .await
            .unwrap();
    }

    let order = h.coordinator.get_order(outcome.order.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Confirmed);
    // Exactly one observable transition despite three deliveries.
    assert_eq!(
        h.bus.published_on(ORDER_TOPIC, ORDER_STATUS_UPDATED).len(),
        1
    );
}

#[tokio::test]
async fn test_payment_failed_cancels_and_releases_stock() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    subscribe_payment_events(h.coordinator.clone(), h.bus.as_ref())
        .await
        .unwrap();

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 3)]))
        .await
        .unwrap();
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(7));

    let payload = PaymentFailedPayload {
        payment_id: "pay_001".to_string(),
        order_id: outcome.order.id(),
        payment_intent_id: outcome.order.payment_intent_id().unwrap().to_string(),
        error: "card declined".to_string(),
    };
    h.bus
        .publish(
            PAYMENT_TOPIC,
            PAYMENT_FAILED,
            serde_json::to_value(&payload).unwrap(),
            None,
        )
        .await
        .unwrap();

    let order = h.coordinator.get_order(outcome.order.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
}

#[tokio::test]
async fn test_late_completion_never_resurrects_cancelled_order() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();
    h.coordinator.cancel_order(outcome.order.id()).await.unwrap();

    let payload = PaymentCompletedPayload {
        payment_id: "pay_001".to_string(),
        order_id: outcome.order.id(),
        payment_intent_id: outcome.order.payment_intent_id().unwrap().to_string(),
        amount: outcome.order.total_amount(),
    };
    h.coordinator.on_payment_completed(payload).await.unwrap();

    let order = h.coordinator.get_order(outcome.order.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_payment_failed_for_cancelled_order_makes_no_change() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 2)]))
        .await
        .unwrap();
    h.coordinator.cancel_order(outcome.order.id()).await.unwrap();
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
    let updates_before = h.bus.published_on(ORDER_TOPIC, ORDER_STATUS_UPDATED).len();

    let payload = PaymentFailedPayload {
        payment_id: "pay_001".to_string(),
        order_id: outcome.order.id(),
        payment_intent_id: outcome.order.payment_intent_id().unwrap().to_string(),
        error: "timeout".to_string(),
    };
    h.coordinator.on_payment_failed(payload).await.unwrap();

    // No double release, no extra status event.
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
    assert_eq!(
        h.bus.published_on(ORDER_TOPIC, ORDER_STATUS_UPDATED).len(),
        updates_before
    );
}

#[tokio::test]
async fn test_payment_event_for_unknown_order_is_dropped() {
    let h = harness();
    let payload = PaymentCompletedPayload {
        payment_id: "pay_001".to_string(),
        order_id: common::OrderId::new(),
        payment_intent_id: "pi_000001".to_string(),
        amount: Money::from_cents(100),
    };
    // Dropped, not an error: at-least-once delivery can outlive state.
    h.coordinator.on_payment_completed(payload).await.unwrap();
}

#[tokio::test]
async fn test_update_status_moves_forward_only() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();
    let order_id = outcome.order.id();
    h.coordinator
        .on_payment_completed(PaymentCompletedPayload {
            payment_id: "pay_001".to_string(),
            order_id,
            payment_intent_id: outcome.order.payment_intent_id().unwrap().to_string(),
            amount: outcome.order.total_amount(),
        })
        .await
        .unwrap();

    let order = h
        .coordinator
        .update_status(order_id, OrderStatus::Processing)
        .await
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Processing);

    // Skipping backwards is rejected and leaves the order unchanged.
    let error = h
        .coordinator
        .update_status(order_id, OrderStatus::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(error, CoordinatorError::Conflict(_)));
    let order = h.coordinator.get_order(order_id).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Processing);
}

#[tokio::test]
async fn test_update_status_rejects_cancellation() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();

    let error = h
        .coordinator
        .update_status(outcome.order.id(), OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert!(matches!(error, CoordinatorError::Conflict(_)));
}

#[tokio::test]
async fn test_update_status_unknown_order_not_found() {
    let h = harness();
    let error = h
        .coordinator
        .update_status(common::OrderId::new(), OrderStatus::Processing)
        .await
        .unwrap_err();
    assert!(matches!(error, CoordinatorError::NotFound(_)));
}

#[tokio::test]
async fn test_cancel_order_releases_held_stock() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 4)]))
        .await
        .unwrap();
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(6));

    let order = h.coordinator.cancel_order(outcome.order.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
}

#[tokio::test]
async fn test_cancel_confirmed_order_rejected() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();
    h.coordinator
        .on_payment_completed(PaymentCompletedPayload {
            payment_id: "pay_001".to_string(),
            order_id: outcome.order.id(),
            payment_intent_id: outcome.order.payment_intent_id().unwrap().to_string(),
            amount: outcome.order.total_amount(),
        })
        .await
        .unwrap();

    let error = h
        .coordinator
        .cancel_order(outcome.order.id())
        .await
        .unwrap_err();
    assert!(matches!(error, CoordinatorError::Conflict(_)));
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(9));
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let coordinator = h.coordinator.clone();
        handles.push(tokio::spawn(async move {
            coordinator.create_order(request(vec![("SKU-001", 1)])).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 10);
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(0));
}

#[tokio::test]
async fn test_reaper_cancels_stale_awaiting_payment_orders() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 2)]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    let reaped = h
        .coordinator
        .reap_stale_orders(chrono::Duration::zero())
        .await
        .unwrap();
    assert_eq!(reaped, 1);

    let order = h.coordinator.get_order(outcome.order.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::Cancelled);
    assert_eq!(h.inventory.available(&ProductId::new("SKU-001")), Some(10));
}

#[tokio::test]
async fn test_reaper_leaves_fresh_orders_alone() {
    let h = harness();
    h.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let outcome = h
        .coordinator
        .create_order(request(vec![("SKU-001", 1)]))
        .await
        .unwrap();

    let reaped = h
        .coordinator
        .reap_stale_orders(chrono::Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(reaped, 0);

    let order = h.coordinator.get_order(outcome.order.id()).await.unwrap();
    assert_eq!(order.status(), OrderStatus::AwaitingPayment);
}
