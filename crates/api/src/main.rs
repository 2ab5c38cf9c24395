//! Coordinator server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::{BusMode, Config, DiscoveryMode};
use api::routes::orders::AppState;
use bus::{InProcessBus, MessageBus, NatsBus, NatsBusConfig};
use coordinator::{
    spawn_reaper, subscribe_payment_events, HttpInventoryService, HttpPaymentService,
    OrderSagaCoordinator,
};
use discovery::{ConsulDirectory, ServiceDirectory, ServiceInstance};
use domain::InMemoryOrderRepository;
use metrics_exporter_prometheus::PrometheusHandle;
use resilience::CircuitBreaker;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve(app: axum::Router, config: &Config) {
    let addr = config.addr();
    tracing::info!(%addr, "starting coordinator server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

fn reaper_deadline(config: &Config) -> chrono::Duration {
    chrono::Duration::seconds(config.reaper_deadline.as_secs() as i64)
}

/// Everything in one process: in-memory repository, collaborator
/// doubles, in-process bus.
async fn run_single_node(config: Config, metrics_handle: PrometheusHandle) {
    let (state, _inventory, _payment, _bus) = api::create_default_state(&config).await;

    let reaper = spawn_reaper(
        state.coordinator.clone(),
        reaper_deadline(&config),
        REAPER_INTERVAL,
    );

    serve(api::create_app(state, metrics_handle), &config).await;
    reaper.abort();
}

/// Distributed mode: collaborators resolved through Consul, events on
/// the configured bus.
async fn run_distributed(config: Config, metrics_handle: PrometheusHandle) {
    let directory: Arc<dyn ServiceDirectory> = Arc::new(ConsulDirectory::new(&config.consul_url));

    let message_bus: Arc<dyn MessageBus> = match config.bus_mode {
        BusMode::Nats => Arc::new(
            NatsBus::connect(NatsBusConfig {
                url: config.nats_url.clone(),
                max_handler_retries: config.bus_max_retries,
            })
            .await
            .expect("failed to connect to NATS"),
        ),
        BusMode::Memory => Arc::new(InProcessBus::new()),
    };

    let coordinator = Arc::new(OrderSagaCoordinator::new(
        InMemoryOrderRepository::new(),
        HttpInventoryService::new(directory.clone()),
        HttpPaymentService::new(directory.clone()),
        message_bus.clone(),
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

    subscribe_payment_events(coordinator.clone(), message_bus.as_ref())
        .await
        .expect("failed to subscribe to payment events");

    let instance = ServiceInstance::new(
        "orders",
        format!("orders-{}", uuid::Uuid::new_v4()),
        config.host.clone(),
        config.port,
        "/health",
    );
    let instance_id = instance.instance_id.clone();
    directory
        .register(instance)
        .await
        .expect("failed to register with service directory");

    let reaper = spawn_reaper(coordinator.clone(), reaper_deadline(&config), REAPER_INTERVAL);

    let state = Arc::new(AppState { coordinator });
    serve(api::create_app(state, metrics_handle), &config).await;

    reaper.abort();
    if let Err(error) = directory.deregister(&instance_id).await {
        tracing::warn!(%error, "failed to deregister from service directory");
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    match config.discovery_mode {
        DiscoveryMode::Memory => run_single_node(config, metrics_handle).await,
        DiscoveryMode::Consul => run_distributed(config, metrics_handle).await,
    }

    tracing::info!("server shut down gracefully");
}
