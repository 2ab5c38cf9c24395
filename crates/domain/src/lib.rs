//! Order domain layer.
//!
//! Owns the `Order`/`OrderItem` model and the `OrderStatus` state machine,
//! and defines the `OrderRepository` contract the coordinator persists
//! through. Storage engines are interchangeable behind the repository
//! trait; an in-memory implementation is provided for single-node use
//! and tests.

pub mod error;
pub mod memory;
pub mod order;
pub mod repository;

pub use error::DomainError;
pub use memory::InMemoryOrderRepository;
pub use order::status::OrderStatus;
pub use order::value_objects::{Money, OrderItem, ProductId, ShippingAddress};
pub use order::Order;
pub use repository::{OrderRepository, RepositoryError, UpdateFn};
