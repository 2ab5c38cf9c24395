//! Service instance record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One running instance of a logical service.
///
/// Created on registration, refreshed on heartbeat, evicted when the
/// heartbeat age exceeds the directory's TTL or the instance
/// deregisters explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
    /// Logical service name, e.g. "product" or "payment".
    pub service_name: String,
    /// Unique instance ID, e.g. "product-7f3a".
    pub instance_id: String,
    /// Host or IP the instance listens on.
    pub address: String,
    /// Port the instance listens on.
    pub port: u16,
    /// Path polled by the health-check pipeline, e.g. "/health".
    pub health_check_path: String,
    /// When the instance last checked in.
    pub last_heartbeat: DateTime<Utc>,
}

impl ServiceInstance {
    /// Creates an instance record with the heartbeat set to now.
    pub fn new(
        service_name: impl Into<String>,
        instance_id: impl Into<String>,
        address: impl Into<String>,
        port: u16,
        health_check_path: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            instance_id: instance_id.into(),
            address: address.into(),
            port,
            health_check_path: health_check_path.into(),
            last_heartbeat: Utc::now(),
        }
    }

    /// Returns the `http://address:port` base URL for this instance.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }
}
