//! Integration tests for the coordinator's HTTP surface.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bus::{InProcessBus, MessageBus};
use coordinator::events::{PaymentCompletedPayload, PAYMENT_COMPLETED, PAYMENT_TOPIC};
use coordinator::{InMemoryInventoryService, InMemoryPaymentService};
use domain::Money;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    app: axum::Router,
    inventory: InMemoryInventoryService,
    payment: InMemoryPaymentService,
    bus: Arc<InProcessBus>,
}

async fn setup() -> TestApp {
    let config = api::config::Config::default();
    let (state, inventory, payment, bus) = api::create_default_state(&config).await;
    let app = api::create_app(state, get_metrics_handle());
    TestApp {
        app,
        inventory,
        payment,
        bus,
    }
}

fn order_body(items: &[(&str, u32)]) -> Body {
    let items: Vec<serde_json::Value> = items
        .iter()
        .map(|(sku, quantity)| {
            serde_json::json!({ "product_id": sku, "quantity": quantity })
        })
        .collect();
    Body::from(
        serde_json::to_string(&serde_json::json!({
            "items": items,
            "shipping_address": {
                "line1": "1 Main St",
                "city": "Springfield",
                "postal_code": "12345",
                "country": "US"
            }
        }))
        .unwrap(),
    )
}

fn post(uri: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn create_order(t: &TestApp, items: &[(&str, u32)]) -> serde_json::Value {
    let response = t
        .app
        .clone()
        .oneshot(post("/orders", order_body(items)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn complete_payment(t: &TestApp, order: &serde_json::Value) {
    let payload = PaymentCompletedPayload {
        payment_id: "pay_test".to_string(),
        order_id: common::OrderId::from_uuid(
            uuid::Uuid::parse_str(order["id"].as_str().unwrap()).unwrap(),
        ),
        payment_intent_id: order["payment_intent_id"].as_str().unwrap().to_string(),
        amount: Money::from_cents(order["total_cents"].as_i64().unwrap()),
    };
    t.bus
        .publish(
            PAYMENT_TOPIC,
            PAYMENT_COMPLETED,
            serde_json::to_value(&payload).unwrap(),
            None,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_reports_breaker_snapshots() {
    let t = setup().await;

    let response = t
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["circuit_breakers"]["product"]["state"], "CLOSED");
    assert_eq!(json["circuit_breakers"]["payment"]["state"], "CLOSED");
    assert_eq!(json["circuit_breakers"]["product"]["failure_count"], 0);
}

#[tokio::test]
async fn test_create_order_returns_201_with_confirmation_handle() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let json = create_order(&t, &[("SKU-001", 2)]).await;

    assert_eq!(json["order"]["status"], "AwaitingPayment");
    assert_eq!(json["order"]["total_cents"], 2000);
    assert!(json["order"]["id"].as_str().is_some());
    assert!(json["order"]["payment_intent_id"].as_str().is_some());
    assert!(json["payment_confirmation_handle"].as_str().is_some());
}

#[tokio::test]
async fn test_create_order_with_no_items_returns_400() {
    let t = setup().await;

    let response = t
        .app
        .oneshot(post("/orders", order_body(&[])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_order_insufficient_stock_returns_400() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 3);

    let response = t
        .app
        .clone()
        .oneshot(post("/orders", order_body(&[("SKU-001", 10)])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    // Stock untouched.
    assert_eq!(
        t.inventory.available(&domain::ProductId::new("SKU-001")),
        Some(3)
    );
}

#[tokio::test]
async fn test_create_order_payment_outage_returns_503() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    t.payment.set_unavailable(true);

    let response = t
        .app
        .oneshot(post("/orders", order_body(&[("SKU-001", 1)])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_create_order_gateway_rejection_returns_502() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    t.payment.set_reject(true);

    let response = t
        .app
        .oneshot(post("/orders", order_body(&[("SKU-001", 1)])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_get_order_roundtrip() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1500), 10);

    let created = create_order(&t, &[("SKU-001", 1)]).await;
    let id = created["order"]["id"].as_str().unwrap();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], id);
    assert_eq!(json["total_cents"], 1500);
    assert_eq!(json["items"][0]["product_id"], "SKU-001");
}

#[tokio::test]
async fn test_get_unknown_order_returns_404() {
    let t = setup().await;

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_malformed_order_id_returns_400() {
    let t = setup().await;

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri("/orders/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_status_moves_confirmed_order_forward() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let created = create_order(&t, &[("SKU-001", 1)]).await;
    complete_payment(&t, &created["order"]).await;
    let id = created["order"]["id"].as_str().unwrap();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/orders/{id}/status"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"Processing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Processing");
}

#[tokio::test]
async fn test_update_status_backwards_returns_409() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let created = create_order(&t, &[("SKU-001", 1)]).await;
    complete_payment(&t, &created["order"]).await;
    let id = created["order"]["id"].as_str().unwrap();

    // Confirmed -> Shipped skips Processing.
    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/orders/{id}/status"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"Shipped"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_status_to_cancelled_returns_409() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);

    let created = create_order(&t, &[("SKU-001", 1)]).await;
    let id = created["order"]["id"].as_str().unwrap();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/orders/{id}/status"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"Cancelled"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_status_unknown_order_returns_404() {
    let t = setup().await;

    let response = t
        .app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/orders/{}/status", uuid::Uuid::new_v4()))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"status":"Processing"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_order_releases_stock() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 5);

    let created = create_order(&t, &[("SKU-001", 3)]).await;
    let id = created["order"]["id"].as_str().unwrap();
    assert_eq!(
        t.inventory.available(&domain::ProductId::new("SKU-001")),
        Some(2)
    );

    let response = t
        .app
        .clone()
        .oneshot(post(&format!("/orders/{id}/cancel"), Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "Cancelled");
    assert_eq!(
        t.inventory.available(&domain::ProductId::new("SKU-001")),
        Some(5)
    );
}

#[tokio::test]
async fn test_breaker_state_visible_on_health_after_outage() {
    let t = setup().await;
    t.inventory.set_stock("SKU-001", Money::from_cents(1000), 10);
    t.payment.set_unavailable(true);

    // Default threshold is 5; drive the payment breaker open.
    for _ in 0..5 {
        let response = t
            .app
            .clone()
            .oneshot(post("/orders", order_body(&[("SKU-001", 1)])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    let response = t
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["circuit_breakers"]["payment"]["state"], "OPEN");
    assert_eq!(json["circuit_breakers"]["payment"]["failure_count"], 5);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let t = setup().await;

    let response = t
        .app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
