//! Contracts for the downstream services the saga talks to.
//!
//! Each contract ships two implementations: an HTTP client that
//! resolves its target through the service directory, and an in-memory
//! double used in single-node mode and tests.

pub mod inventory;
pub mod payment;

use discovery::DirectoryError;
use domain::ProductId;
use thiserror::Error;

/// Errors surfaced by a downstream service call.
///
/// Only [`ServiceError::Unavailable`] represents a transport fault and
/// feeds the circuit breaker; the other variants are business answers
/// from a healthy dependency.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Not enough stock to cover the requested quantity.
    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The dependency refused the request for a business reason, e.g.
    /// the payment gateway declined the intent.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The dependency could not be reached or answered with a server
    /// error. Counts as a circuit breaker failure.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl ServiceError {
    /// True for transport faults that should trip the breaker.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ServiceError::Unavailable(_))
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(error: DirectoryError) -> Self {
        ServiceError::Unavailable(error.to_string())
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(error: reqwest::Error) -> Self {
        ServiceError::Unavailable(error.to_string())
    }
}
