//! Domain error types.

use thiserror::Error;

use crate::order::status::OrderStatus;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested status transition is not allowed by the state machine.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// An order must contain at least one item.
    #[error("Order has no items")]
    NoItems,

    /// Item quantity must be greater than zero.
    #[error("Invalid quantity {quantity} for product {product_id}")]
    InvalidQuantity { product_id: String, quantity: u32 },

    /// Unit price must not be negative.
    #[error("Invalid unit price for product {product_id}")]
    InvalidPrice { product_id: String },

    /// A payment intent has already been assigned to this order.
    #[error("Payment intent already assigned: {existing}")]
    PaymentIntentAlreadyAssigned { existing: String },

    /// Items cannot be changed after the order has left Pending.
    #[error("Order items are immutable in {status} status")]
    ItemsImmutable { status: OrderStatus },
}
