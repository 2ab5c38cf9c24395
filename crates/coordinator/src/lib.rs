//! Order fulfillment saga coordinator.
//!
//! Drives the multi-step order workflow across the product and payment
//! domains: price lookup and inventory reservation through the product
//! circuit breaker, payment-intent creation through the payment
//! breaker, compensation (release + cancel) on partial failure, and
//! asynchronous finalization from `payment.completed` /
//! `payment.failed` events. Everything after `AwaitingPayment` is
//! event-driven; no request task ever blocks waiting for the gateway.

pub mod coordinator;
pub mod error;
pub mod events;
pub mod handlers;
pub mod reaper;
pub mod services;

pub use coordinator::{
    CreateOrderOutcome, CreateOrderRequest, OrderItemRequest, OrderSagaCoordinator,
};
pub use error::CoordinatorError;
pub use handlers::subscribe_payment_events;
pub use reaper::spawn_reaper;
pub use services::inventory::{
    HttpInventoryService, InMemoryInventoryService, InventoryService, ProductInfo,
    ReservationOutcome,
};
pub use services::payment::{
    HttpPaymentService, InMemoryPaymentService, PaymentIntent, PaymentService,
};
pub use services::ServiceError;
