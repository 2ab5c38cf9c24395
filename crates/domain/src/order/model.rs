//! The Order aggregate.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::order::status::OrderStatus;
use crate::order::value_objects::{Money, OrderItem, ShippingAddress};

/// An order owned and mutated only by the saga coordinator.
///
/// Invariants maintained by construction and the mutation methods:
/// - `total_amount` equals the sum of item totals,
/// - `payment_intent_id` is assigned exactly once,
/// - items are immutable once the order leaves `Pending`,
/// - status only moves along the state machine in [`OrderStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total_amount: Money,
    shipping_address: ShippingAddress,
    payment_intent_id: Option<String>,
    items: Vec<OrderItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order in `Pending` status.
    ///
    /// Validates that the item list is non-empty, every quantity is
    /// positive, and no unit price is negative. The total is computed
    /// from the items, never supplied by the caller.
    pub fn new(
        user_id: UserId,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
    ) -> Result<Self, DomainError> {
        if items.is_empty() {
            return Err(DomainError::NoItems);
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(DomainError::InvalidQuantity {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                });
            }
            if item.unit_price.is_negative() {
                return Err(DomainError::InvalidPrice {
                    product_id: item.product_id.to_string(),
                });
            }
        }

        let total_amount = items
            .iter()
            .fold(Money::zero(), |acc, item| acc + item.total_price);
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            user_id,
            status: OrderStatus::Pending,
            total_amount,
            shipping_address,
            payment_intent_id: None,
            items,
            created_at: now,
            updated_at: now,
        })
    }

    /// Moves the order to `next`, rejecting transitions the state machine
    /// does not allow.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records the payment intent opened for this order. Set exactly once.
    pub fn assign_payment_intent(&mut self, intent_id: impl Into<String>) -> Result<(), DomainError> {
        if let Some(existing) = &self.payment_intent_id {
            return Err(DomainError::PaymentIntentAlreadyAssigned {
                existing: existing.clone(),
            });
        }
        self.payment_intent_id = Some(intent_id.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_intent_id(&self) -> Option<&str> {
        self.payment_intent_id.as_deref()
    }

    pub fn items(&self) -> impl Iterator<Item = &OrderItem> {
        self.items.iter()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
