//! Payment intent contract and its implementations.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::OrderId;
use discovery::ServiceDirectory;
use domain::Money;
use serde::Deserialize;

use crate::services::ServiceError;

/// An open payment intent at the gateway.
///
/// `confirmation_handle` is the client-side token the storefront uses
/// to complete the charge. It is returned to the caller once and never
/// persisted on the order.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub confirmation_handle: String,
}

/// Payment gateway contract. Creating an intent authorizes nothing;
/// settlement outcomes arrive later as `payment.completed` /
/// `payment.failed` events.
#[async_trait]
pub trait PaymentService: Send + Sync {
    async fn create_intent(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<PaymentIntent, ServiceError>;
}

/// In-memory gateway double for single-node mode and tests.
#[derive(Clone, Default)]
pub struct InMemoryPaymentService {
    counter: Arc<AtomicU64>,
    intents: Arc<Mutex<Vec<(String, OrderId, Money)>>>,
    reject: Arc<AtomicBool>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent calls fail with a business rejection.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// Simulates a transport outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of intents created so far.
    pub fn intent_count(&self) -> usize {
        self.intents.lock().unwrap().len()
    }

    /// The order and amount recorded for an intent, if it exists.
    pub fn intent(&self, intent_id: &str) -> Option<(OrderId, Money)> {
        self.intents
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _, _)| id == intent_id)
            .map(|(_, order_id, amount)| (*order_id, *amount))
    }
}

#[async_trait]
impl PaymentService for InMemoryPaymentService {
    async fn create_intent(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<PaymentIntent, ServiceError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ServiceError::Unavailable(
                "payment service connection refused".to_string(),
            ));
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(ServiceError::Rejected(
                "card verification declined".to_string(),
            ));
        }

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let intent_id = format!("pi_{n:06}");
        self.intents
            .lock()
            .unwrap()
            .push((intent_id.clone(), order_id, amount));

        Ok(PaymentIntent {
            confirmation_handle: format!("{intent_id}_secret"),
            intent_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CreateIntentResponse {
    payment_intent_id: String,
    client_secret: String,
}

/// HTTP client for the payment service, resolved through the directory.
pub struct HttpPaymentService {
    directory: Arc<dyn ServiceDirectory>,
    client: reqwest::Client,
    service_name: String,
}

impl HttpPaymentService {
    pub fn new(directory: Arc<dyn ServiceDirectory>) -> Self {
        Self {
            directory,
            client: reqwest::Client::new(),
            service_name: "payment".to_string(),
        }
    }
}

#[async_trait]
impl PaymentService for HttpPaymentService {
    async fn create_intent(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<PaymentIntent, ServiceError> {
        let instance = self.directory.resolve(&self.service_name).await?;
        let url = format!("{}/create-intent", instance.base_url());
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "order_id": order_id,
                "amount_cents": amount.cents(),
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ServiceError::Unavailable(format!(
                "payment service returned {status}"
            )));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::Rejected(format!(
                "payment service returned {status}: {body}"
            )));
        }

        let body: CreateIntentResponse = response.json().await?;
        Ok(PaymentIntent {
            intent_id: body.payment_intent_id,
            confirmation_handle: body.client_secret,
        })
    }
}
