//! Service discovery.
//!
//! A [`ServiceDirectory`] maps a logical service name ("product",
//! "payment") to network endpoints that are currently healthy. Two
//! implementations exist behind the trait: [`InMemoryDirectory`] for
//! single-node operation (heartbeat TTL eviction) and
//! [`ConsulDirectory`] backed by a Consul agent (health checks run by
//! the cluster). Which one is used is a startup configuration choice;
//! call sites only ever see the trait.

pub mod consul;
pub mod error;
pub mod instance;
pub mod memory;

use async_trait::async_trait;

pub use consul::ConsulDirectory;
pub use error::DirectoryError;
pub use instance::ServiceInstance;
pub use memory::InMemoryDirectory;

/// Registry of running service instances.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Registers (or refreshes) a service instance. Idempotent upsert
    /// keyed by `instance_id`.
    async fn register(&self, instance: ServiceInstance) -> Result<(), DirectoryError>;

    /// Removes an instance immediately.
    async fn deregister(&self, instance_id: &str) -> Result<(), DirectoryError>;

    /// Refreshes an instance's heartbeat. A no-op for registry backends
    /// whose health pipeline runs out of process.
    async fn heartbeat(&self, instance_id: &str) -> Result<(), DirectoryError>;

    /// Returns the instances of `service_name` currently considered healthy.
    async fn discover(&self, service_name: &str) -> Result<Vec<ServiceInstance>, DirectoryError>;

    /// Selects one healthy instance of `service_name`, round-robin over
    /// the current healthy set. Fails with `NoHealthyInstance` if the
    /// set is empty.
    async fn resolve(&self, service_name: &str) -> Result<ServiceInstance, DirectoryError>;
}
