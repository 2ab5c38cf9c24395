//! Bus error types.

use thiserror::Error;

/// Errors that can occur during bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Broker connection or publish failure.
    #[error("Broker error: {0}")]
    Broker(String),

    /// Payload could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A subscriber handler failed; the delivery may be retried.
    #[error("Handler error: {0}")]
    Handler(String),
}
