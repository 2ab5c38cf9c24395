//! Inventory reservation contract and its implementations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bus::MessageBus;
use discovery::ServiceDirectory;
use domain::{Money, ProductId};
use serde::Deserialize;

use crate::events::{InventoryReservedPayload, INVENTORY_RESERVED, PRODUCT_TOPIC};
use crate::services::ServiceError;

/// Catalog data for a single product.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub product_id: ProductId,
    pub price: Money,
    pub available: u32,
}

/// Result of a granted reservation.
#[derive(Debug, Clone, Copy)]
pub struct ReservationOutcome {
    /// Stock remaining after the decrement.
    pub remaining: u32,
}

/// Inventory reservation contract.
///
/// `reserve` must be atomic per product: check and decrement happen as
/// one operation, so concurrent orders can never oversell. `release` is
/// the compensating action and must tolerate being called for stock the
/// caller no longer holds.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Fetches price and availability for a product.
    async fn fetch_product(&self, product_id: &ProductId) -> Result<ProductInfo, ServiceError>;

    /// Atomically reserves `quantity` units, or fails without taking any.
    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ReservationOutcome, ServiceError>;

    /// Returns previously reserved units to the pool.
    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone)]
struct StockRecord {
    price: Money,
    available: u32,
}

/// In-memory inventory for single-node mode and tests.
///
/// All stock mutations happen under one mutex, which gives `reserve`
/// its check-and-decrement atomicity. Optionally publishes
/// `inventory.reserved` the way the real product service does.
#[derive(Clone, Default)]
pub struct InMemoryInventoryService {
    stock: Arc<Mutex<HashMap<ProductId, StockRecord>>>,
    bus: Option<Arc<dyn MessageBus>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryInventoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a bus so reservations emit `inventory.reserved`.
    pub fn with_bus(mut self, bus: Arc<dyn MessageBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Seeds or replaces the stock record for a product.
    pub fn set_stock(&self, product_id: impl Into<ProductId>, price: Money, available: u32) {
        self.stock
            .lock()
            .unwrap()
            .insert(product_id.into(), StockRecord { price, available });
    }

    /// Current availability, if the product exists.
    pub fn available(&self, product_id: &ProductId) -> Option<u32> {
        self.stock
            .lock()
            .unwrap()
            .get(product_id)
            .map(|r| r.available)
    }

    /// Simulates a transport outage: every call fails with
    /// [`ServiceError::Unavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_reachable(&self) -> Result<(), ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable(
                "product service connection refused".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<ProductInfo, ServiceError> {
        self.check_reachable()?;
        let stock = self.stock.lock().unwrap();
        let record = stock
            .get(product_id)
            .ok_or_else(|| ServiceError::ProductNotFound(product_id.clone()))?;
        Ok(ProductInfo {
            product_id: product_id.clone(),
            price: record.price,
            available: record.available,
        })
    }

    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ReservationOutcome, ServiceError> {
        self.check_reachable()?;
        let remaining = {
            let mut stock = self.stock.lock().unwrap();
            let record = stock
                .get_mut(product_id)
                .ok_or_else(|| ServiceError::ProductNotFound(product_id.clone()))?;
            if record.available < quantity {
                return Err(ServiceError::InsufficientStock {
                    product_id: product_id.clone(),
                    requested: quantity,
                    available: record.available,
                });
            }
            record.available -= quantity;
            record.available
        };

        if let Some(bus) = &self.bus {
            let payload = InventoryReservedPayload {
                product_id: product_id.clone(),
                quantity,
                remaining_inventory: remaining,
            };
            match serde_json::to_value(&payload) {
                Ok(value) => {
                    if let Err(error) =
                        bus.publish(PRODUCT_TOPIC, INVENTORY_RESERVED, value, None).await
                    {
                        tracing::warn!(%product_id, %error, "failed to publish inventory.reserved");
                    }
                }
                Err(error) => {
                    tracing::warn!(%product_id, %error, "failed to encode inventory.reserved");
                }
            }
        }

        Ok(ReservationOutcome { remaining })
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<(), ServiceError> {
        self.check_reachable()?;
        let mut stock = self.stock.lock().unwrap();
        let record = stock
            .get_mut(product_id)
            .ok_or_else(|| ServiceError::ProductNotFound(product_id.clone()))?;
        record.available += quantity;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    price_cents: i64,
    inventory: u32,
}

#[derive(Debug, Deserialize)]
struct ReserveResponse {
    remaining_inventory: u32,
}

#[derive(Debug, Deserialize)]
struct StockErrorResponse {
    #[serde(default)]
    available: u32,
}

/// HTTP client for the product service, resolved per call through the
/// service directory so instance churn is picked up immediately.
pub struct HttpInventoryService {
    directory: Arc<dyn ServiceDirectory>,
    client: reqwest::Client,
    service_name: String,
}

impl HttpInventoryService {
    pub fn new(directory: Arc<dyn ServiceDirectory>) -> Self {
        Self {
            directory,
            client: reqwest::Client::new(),
            service_name: "product".to_string(),
        }
    }

    async fn base_url(&self) -> Result<String, ServiceError> {
        let instance = self.directory.resolve(&self.service_name).await?;
        Ok(instance.base_url())
    }
}

#[async_trait]
impl InventoryService for HttpInventoryService {
    async fn fetch_product(&self, product_id: &ProductId) -> Result<ProductInfo, ServiceError> {
        let url = format!("{}/products/{}", self.base_url().await?, product_id);
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::ProductNotFound(product_id.clone()));
        }
        if response.status().is_server_error() {
            return Err(ServiceError::Unavailable(format!(
                "product service returned {}",
                response.status()
            )));
        }
        let body: ProductResponse = response.error_for_status()?.json().await?;
        Ok(ProductInfo {
            product_id: product_id.clone(),
            price: Money::from_cents(body.price_cents),
            available: body.inventory,
        })
    }

    async fn reserve(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<ReservationOutcome, ServiceError> {
        let url = format!("{}/products/{}/reserve", self.base_url().await?, product_id);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "quantity": quantity }))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            Err(ServiceError::ProductNotFound(product_id.clone()))
        } else if status == reqwest::StatusCode::CONFLICT
            || status == reqwest::StatusCode::BAD_REQUEST
        {
            let body: StockErrorResponse = response
                .json()
                .await
                .unwrap_or(StockErrorResponse { available: 0 });
            Err(ServiceError::InsufficientStock {
                product_id: product_id.clone(),
                requested: quantity,
                available: body.available,
            })
        } else if status.is_server_error() {
            Err(ServiceError::Unavailable(format!(
                "product service returned {status}"
            )))
        } else {
            let body: ReserveResponse = response.error_for_status()?.json().await?;
            Ok(ReservationOutcome {
                remaining: body.remaining_inventory,
            })
        }
    }

    async fn release(&self, product_id: &ProductId, quantity: u32) -> Result<(), ServiceError> {
        let url = format!("{}/products/{}/release", self.base_url().await?, product_id);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "quantity": quantity }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ServiceError::ProductNotFound(product_id.clone()));
        }
        response.error_for_status()?;
        Ok(())
    }
}
