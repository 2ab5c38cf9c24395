//! Event topics, routing keys, and payload schemas.
//!
//! Delivery is at-least-once, so every consumer of these payloads must
//! be idempotent.

use common::{OrderId, UserId};
use domain::{Money, OrderStatus, ProductId};
use serde::{Deserialize, Serialize};

/// Order lifecycle events published by the coordinator.
pub const ORDER_TOPIC: &str = "order.events";
/// Settlement outcomes published by the payment service.
pub const PAYMENT_TOPIC: &str = "payment.events";
/// Stock movements published by the product service.
pub const PRODUCT_TOPIC: &str = "product.events";

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_STATUS_UPDATED: &str = "order.status.updated";
pub const PAYMENT_COMPLETED: &str = "payment.completed";
pub const PAYMENT_FAILED: &str = "payment.failed";
pub const INVENTORY_RESERVED: &str = "inventory.reserved";

/// Published once per order after the saga reaches `AwaitingPayment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedPayload {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub items: Vec<OrderCreatedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Published on every observable status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusUpdatedPayload {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub previous_status: OrderStatus,
}

/// The gateway settled the charge for an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompletedPayload {
    pub payment_id: String,
    pub order_id: OrderId,
    pub payment_intent_id: String,
    pub amount: Money,
}

/// The gateway gave up on an intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedPayload {
    pub payment_id: String,
    pub order_id: OrderId,
    pub payment_intent_id: String,
    pub error: String,
}

/// Stock was decremented for a reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryReservedPayload {
    pub product_id: ProductId,
    pub quantity: u32,
    pub remaining_inventory: u32,
}
