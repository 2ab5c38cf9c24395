//! Repository contract the coordinator persists orders through.
//!
//! Relational persistence is out of scope here; any storage engine that
//! can load, insert, and atomically update an order satisfies the
//! contract. `atomic_update` runs the supplied closure under whatever
//! serialization the store provides, so concurrent event deliveries for
//! the same order observe a consistent status.

use async_trait::async_trait;
use common::OrderId;
use thiserror::Error;

use crate::error::DomainError;
use crate::order::status::OrderStatus;
use crate::order::Order;

/// Closure applied to an order inside `atomic_update`.
pub type UpdateFn = Box<dyn FnOnce(&mut Order) -> Result<(), DomainError> + Send>;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No order with the given ID.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The update closure rejected the mutation.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage engine failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Persistence contract for orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Loads an order by ID.
    async fn load(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Inserts a new order.
    async fn save(&self, order: &Order) -> Result<(), RepositoryError>;

    /// Applies `update` to the stored order as a single indivisible
    /// operation and returns the updated order. If the closure errors,
    /// the stored order is left unchanged.
    async fn atomic_update(&self, id: OrderId, update: UpdateFn) -> Result<Order, RepositoryError>;

    /// Returns all orders currently in `status`. Used by the reaper to
    /// find orders stuck in `AwaitingPayment`.
    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError>;
}
