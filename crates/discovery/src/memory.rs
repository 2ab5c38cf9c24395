//! In-memory directory for single-node operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::error::DirectoryError;
use crate::instance::ServiceInstance;
use crate::ServiceDirectory;

const DEFAULT_HEARTBEAT_TTL_SECS: i64 = 30;

/// Local instance registry with heartbeat-TTL health.
///
/// An instance counts as healthy while its last heartbeat is younger
/// than the TTL. Reads dominate; registration and heartbeats take the
/// write lock briefly. Round-robin selection state lives outside the
/// instance map so `resolve` is uniform over whatever the healthy set
/// happens to be at call time.
#[derive(Debug, Clone)]
pub struct InMemoryDirectory {
    instances: Arc<RwLock<HashMap<String, ServiceInstance>>>,
    round_robin: Arc<AtomicUsize>,
    heartbeat_ttl: Duration,
}

impl InMemoryDirectory {
    /// Creates a directory with the default 30s heartbeat TTL.
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_HEARTBEAT_TTL_SECS))
    }

    /// Creates a directory with a custom heartbeat TTL.
    pub fn with_ttl(heartbeat_ttl: Duration) -> Self {
        Self {
            instances: Arc::new(RwLock::new(HashMap::new())),
            round_robin: Arc::new(AtomicUsize::new(0)),
            heartbeat_ttl,
        }
    }

    /// Returns the number of registered instances, healthy or not.
    pub fn len(&self) -> usize {
        self.instances.read().unwrap().len()
    }

    /// Returns true if no instances are registered.
    pub fn is_empty(&self) -> bool {
        self.instances.read().unwrap().is_empty()
    }

    fn healthy(&self, service_name: &str) -> Vec<ServiceInstance> {
        let cutoff = Utc::now() - self.heartbeat_ttl;
        let mut healthy: Vec<ServiceInstance> = self
            .instances
            .read()
            .unwrap()
            .values()
            .filter(|i| i.service_name == service_name && i.last_heartbeat > cutoff)
            .cloned()
            .collect();
        // Stable order so round-robin cycles rather than flapping.
        healthy.sort_by(|a, b| a.instance_id.cmp(&b.instance_id));
        healthy
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceDirectory for InMemoryDirectory {
    async fn register(&self, instance: ServiceInstance) -> Result<(), DirectoryError> {
        tracing::info!(
            service = %instance.service_name,
            instance = %instance.instance_id,
            "service registered"
        );
        self.instances
            .write()
            .unwrap()
            .insert(instance.instance_id.clone(), instance);
        Ok(())
    }

    async fn deregister(&self, instance_id: &str) -> Result<(), DirectoryError> {
        let removed = self.instances.write().unwrap().remove(instance_id);
        match removed {
            Some(instance) => {
                tracing::info!(
                    service = %instance.service_name,
                    instance = %instance_id,
                    "service deregistered"
                );
                Ok(())
            }
            None => Err(DirectoryError::InstanceNotFound(instance_id.to_string())),
        }
    }

    async fn heartbeat(&self, instance_id: &str) -> Result<(), DirectoryError> {
        let mut instances = self.instances.write().unwrap();
        match instances.get_mut(instance_id) {
            Some(instance) => {
                instance.last_heartbeat = Utc::now();
                Ok(())
            }
            None => Err(DirectoryError::InstanceNotFound(instance_id.to_string())),
        }
    }

    async fn discover(&self, service_name: &str) -> Result<Vec<ServiceInstance>, DirectoryError> {
        Ok(self.healthy(service_name))
    }

    async fn resolve(&self, service_name: &str) -> Result<ServiceInstance, DirectoryError> {
        let healthy = self.healthy(service_name);
        if healthy.is_empty() {
            return Err(DirectoryError::NoHealthyInstance(service_name.to_string()));
        }
        let index = self.round_robin.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Ok(healthy[index].clone())
    }
}
