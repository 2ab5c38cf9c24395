//! Health check endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use coordinator::{InventoryService, PaymentService};
use domain::OrderRepository;
use resilience::BreakerSnapshot;
use serde::Serialize;

use crate::routes::orders::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub circuit_breakers: CircuitBreakers,
}

#[derive(Serialize)]
pub struct CircuitBreakers {
    pub product: BreakerSnapshot,
    pub payment: BreakerSnapshot,
}

/// GET /health — liveness plus a snapshot of each dependency breaker.
///
/// Always `200`; an open breaker is reported, not treated as unhealthy,
/// so orchestrators do not restart the coordinator over a downstream
/// outage.
pub async fn check<R, I, P>(State(state): State<Arc<AppState<R, I, P>>>) -> Json<HealthResponse>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    Json(HealthResponse {
        status: "ok",
        service: "orders",
        circuit_breakers: CircuitBreakers {
            product: state.coordinator.product_breaker().snapshot(),
            payment: state.coordinator.payment_breaker().snapshot(),
        },
    })
}
