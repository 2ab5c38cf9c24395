//! Directory error types.

use thiserror::Error;

/// Errors that can occur during directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// No healthy instance of the requested service.
    #[error("No healthy instances of {0} found")]
    NoHealthyInstance(String),

    /// The backing registry could not be reached or rejected the request.
    #[error("Registry error: {0}")]
    Registry(String),

    /// Unknown instance ID.
    #[error("Instance not registered: {0}")]
    InstanceNotFound(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        DirectoryError::Registry(err.to_string())
    }
}
