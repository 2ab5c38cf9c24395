//! Background cleanup of orders stuck in `AwaitingPayment`.
//!
//! The gateway normally decides every intent, but under at-least-once
//! delivery a terminal event can be lost for good (broker wipe, retry
//! budget exhausted). The reaper sweeps orders whose settlement never
//! arrived and cancels them through the same path a `payment.failed`
//! event would take, so stock always comes back eventually.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use common::OrderId;
use domain::{OrderRepository, OrderStatus};

use crate::coordinator::OrderSagaCoordinator;
use crate::error::CoordinatorError;
use crate::events::PaymentFailedPayload;
use crate::services::inventory::InventoryService;
use crate::services::payment::PaymentService;

impl<R, I, P> OrderSagaCoordinator<R, I, P>
where
    R: OrderRepository,
    I: InventoryService,
    P: PaymentService,
{
    /// Cancels every order that has been awaiting payment longer than
    /// `deadline`. Returns how many orders were reaped.
    #[tracing::instrument(skip(self))]
    pub async fn reap_stale_orders(
        &self,
        deadline: chrono::Duration,
    ) -> Result<usize, CoordinatorError> {
        let cutoff = Utc::now() - deadline;
        let stale: Vec<OrderId> = self
            .repository()
            .list_by_status(OrderStatus::AwaitingPayment)
            .await?
            .into_iter()
            .filter(|order| order.updated_at() < cutoff)
            .map(|order| order.id())
            .collect();

        let mut reaped = 0;
        for order_id in stale {
            let payload = PaymentFailedPayload {
                payment_id: String::new(),
                order_id,
                payment_intent_id: String::new(),
                error: "payment deadline exceeded".to_string(),
            };
            match self.on_payment_failed(payload).await {
                Ok(()) => {
                    metrics::counter!("orders_reaped_total").increment(1);
                    tracing::warn!(%order_id, "stale order reaped");
                    reaped += 1;
                }
                Err(error) => {
                    tracing::error!(%order_id, %error, "failed to reap stale order");
                }
            }
        }
        Ok(reaped)
    }
}

/// Runs the reaper on a fixed interval until the task is aborted.
pub fn spawn_reaper<R, I, P>(
    coordinator: Arc<OrderSagaCoordinator<R, I, P>>,
    deadline: chrono::Duration,
    interval: Duration,
) -> tokio::task::JoinHandle<()>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; skip it so a fresh process
        // does not sweep before subscriptions are up.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match coordinator.reap_stale_orders(deadline).await {
                Ok(0) => {}
                Ok(reaped) => tracing::info!(reaped, "reaper pass complete"),
                Err(error) => tracing::error!(%error, "reaper pass failed"),
            }
        }
    })
}
