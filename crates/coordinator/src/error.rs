//! Coordinator error taxonomy.

use bus::BusError;
use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::services::ServiceError;

/// Errors surfaced by saga operations. The API layer maps each variant
/// to a status code, so the split between validation, conflict, and
/// availability matters more than the message text.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The request itself is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The referenced order or product does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A product could not cover the requested quantity.
    #[error("Insufficient inventory for product {product_id}")]
    InsufficientInventory { product_id: String },

    /// A dependency is unreachable or its circuit is open.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The payment gateway rejected the intent.
    #[error("Payment error: {0}")]
    Payment(String),

    /// The requested change conflicts with the order's current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage engine failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Event publication failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// Payload encoding failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<DomainError> for CoordinatorError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidStatusTransition { .. }
            | DomainError::PaymentIntentAlreadyAssigned { .. }
            | DomainError::ItemsImmutable { .. } => CoordinatorError::Conflict(error.to_string()),
            DomainError::NoItems
            | DomainError::InvalidQuantity { .. }
            | DomainError::InvalidPrice { .. } => CoordinatorError::Validation(error.to_string()),
        }
    }
}

impl From<RepositoryError> for CoordinatorError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(id) => CoordinatorError::NotFound(format!("order {id}")),
            RepositoryError::Domain(domain) => domain.into(),
            RepositoryError::Storage(message) => CoordinatorError::Storage(message),
        }
    }
}

impl From<ServiceError> for CoordinatorError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::ProductNotFound(id) => CoordinatorError::NotFound(format!("product {id}")),
            ServiceError::InsufficientStock { product_id, .. } => {
                CoordinatorError::InsufficientInventory {
                    product_id: product_id.to_string(),
                }
            }
            ServiceError::Rejected(message) => CoordinatorError::Payment(message),
            ServiceError::Unavailable(message) => CoordinatorError::ServiceUnavailable(message),
        }
    }
}
