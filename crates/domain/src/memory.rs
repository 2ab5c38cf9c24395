//! In-memory order repository for single-node operation and tests.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OrderId;

use crate::order::status::OrderStatus;
use crate::order::Order;
use crate::repository::{OrderRepository, RepositoryError, UpdateFn};

/// Stores orders in a map behind a `RwLock`.
///
/// `atomic_update` holds the write lock for the whole read-modify-write,
/// which makes status checks and transitions linearizable per order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub fn len(&self) -> usize {
        self.orders.read().unwrap().len()
    }

    /// Returns true if no orders are stored.
    pub fn is_empty(&self) -> bool {
        self.orders.read().unwrap().is_empty()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn load(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().unwrap().get(&id).cloned())
    }

    async fn save(&self, order: &Order) -> Result<(), RepositoryError> {
        self.orders
            .write()
            .unwrap()
            .insert(order.id(), order.clone());
        Ok(())
    }

    async fn atomic_update(&self, id: OrderId, update: UpdateFn) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().unwrap();
        let order = orders.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
        update(order)?;
        Ok(order.clone())
    }

    async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .orders
            .read()
            .unwrap()
            .values()
            .filter(|o| o.status() == status)
            .cloned()
            .collect())
    }
}
