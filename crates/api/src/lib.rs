//! HTTP surface for the order fulfillment coordinator.
//!
//! Exposes order creation, status administration, and cancellation,
//! plus a health endpoint reporting each dependency breaker and a
//! Prometheus metrics endpoint. Structured logging via tracing.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use bus::InProcessBus;
use coordinator::{
    subscribe_payment_events, InMemoryInventoryService, InMemoryPaymentService, InventoryService,
    OrderSagaCoordinator, PaymentService,
};
use domain::{InMemoryOrderRepository, OrderRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use resilience::CircuitBreaker;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// State wired entirely from in-memory implementations.
pub type InMemoryAppState =
    AppState<InMemoryOrderRepository, InMemoryInventoryService, InMemoryPaymentService>;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<R, I, P>(
    state: Arc<AppState<R, I, P>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<R, I, P>))
        .route("/orders", post(routes::orders::create::<R, I, P>))
        .route("/orders/{id}", get(routes::orders::get::<R, I, P>))
        .route(
            "/orders/{id}/status",
            put(routes::orders::update_status::<R, I, P>),
        )
        .route(
            "/orders/{id}/cancel",
            post(routes::orders::cancel::<R, I, P>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates single-node application state: in-memory repository,
/// collaborator doubles, and in-process bus, with settlement handlers
/// already subscribed. Returns the collaborator handles so callers can
/// seed stock and drive payment outcomes.
pub async fn create_default_state(
    config: &Config,
) -> (
    Arc<InMemoryAppState>,
    InMemoryInventoryService,
    InMemoryPaymentService,
    Arc<InProcessBus>,
) {
    let bus = Arc::new(InProcessBus::new());
    let repository = InMemoryOrderRepository::new();
    let inventory = InMemoryInventoryService::new().with_bus(bus.clone());
    let payment = InMemoryPaymentService::new();

    let coordinator = Arc::new(OrderSagaCoordinator::new(
        repository,
        inventory.clone(),
        payment.clone(),
        bus.clone(),
        Arc::new(CircuitBreaker::new(
            "product",
            config.breaker_threshold,
            config.breaker_reset_timeout,
        )),
        Arc::new(CircuitBreaker::new(
            "payment",
            config.breaker_threshold,
            config.breaker_reset_timeout,
        )),
    ));

    subscribe_payment_events(coordinator.clone(), bus.as_ref())
        .await
        .expect("in-process subscription cannot fail");

    let state = Arc::new(AppState { coordinator });
    (state, inventory, payment, bus)
}
