//! Consul-backed directory.
//!
//! Registers instances with the local Consul agent and lets the
//! cluster's health-check pipeline decide which instances are passing.
//! Discovery reflects the agent's view, so it is eventually consistent
//! with the real cluster state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::DirectoryError;
use crate::instance::ServiceInstance;
use crate::ServiceDirectory;

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentCheck {
    #[serde(rename = "HTTP")]
    http: String,
    interval: String,
    timeout: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AgentRegistration {
    #[serde(rename = "ID")]
    id: String,
    name: String,
    address: String,
    port: u16,
    check: AgentCheck,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthEntry {
    service: HealthService,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthService {
    #[serde(rename = "ID")]
    id: String,
    service: String,
    address: String,
    port: u16,
}

/// Directory backed by the Consul agent HTTP API.
pub struct ConsulDirectory {
    client: reqwest::Client,
    base_url: String,
    check_interval: String,
    check_timeout: String,
    round_robin: Arc<AtomicUsize>,
}

impl ConsulDirectory {
    /// Creates a directory talking to the agent at `base_url`
    /// (e.g. `http://localhost:8500`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            check_interval: "10s".to_string(),
            check_timeout: "5s".to_string(),
            round_robin: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl ServiceDirectory for ConsulDirectory {
    async fn register(&self, instance: ServiceInstance) -> Result<(), DirectoryError> {
        let registration = AgentRegistration {
            id: instance.instance_id.clone(),
            name: instance.service_name.clone(),
            address: instance.address.clone(),
            port: instance.port,
            check: AgentCheck {
                http: format!("{}{}", instance.base_url(), instance.health_check_path),
                interval: self.check_interval.clone(),
                timeout: self.check_timeout.clone(),
            },
        };

        let response = self
            .client
            .put(format!("{}/v1/agent/service/register", self.base_url))
            .json(&registration)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::Registry(format!(
                "register returned {}",
                response.status()
            )));
        }
        tracing::info!(
            service = %instance.service_name,
            instance = %instance.instance_id,
            "service registered with consul"
        );
        Ok(())
    }

    async fn deregister(&self, instance_id: &str) -> Result<(), DirectoryError> {
        let response = self
            .client
            .put(format!(
                "{}/v1/agent/service/deregister/{instance_id}",
                self.base_url
            ))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DirectoryError::Registry(format!(
                "deregister returned {}",
                response.status()
            )));
        }
        tracing::info!(instance = %instance_id, "service deregistered from consul");
        Ok(())
    }

    async fn heartbeat(&self, _instance_id: &str) -> Result<(), DirectoryError> {
        // Health is driven by the agent's HTTP check, not client heartbeats.
        Ok(())
    }

    async fn discover(&self, service_name: &str) -> Result<Vec<ServiceInstance>, DirectoryError> {
        let entries: Vec<HealthEntry> = self
            .client
            .get(format!(
                "{}/v1/health/service/{service_name}",
                self.base_url
            ))
            .query(&[("passing", "true")])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| DirectoryError::Registry(e.to_string()))?
            .json()
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| ServiceInstance {
                service_name: entry.service.service,
                instance_id: entry.service.id,
                address: entry.service.address,
                port: entry.service.port,
                health_check_path: "/health".to_string(),
                last_heartbeat: Utc::now(),
            })
            .collect())
    }

    async fn resolve(&self, service_name: &str) -> Result<ServiceInstance, DirectoryError> {
        let healthy = self.discover(service_name).await?;
        if healthy.is_empty() {
            return Err(DirectoryError::NoHealthyInstance(service_name.to_string()));
        }
        let index = self.round_robin.fetch_add(1, Ordering::Relaxed) % healthy.len();
        Ok(healthy[index].clone())
    }
}
