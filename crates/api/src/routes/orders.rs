//! Order creation, status, and cancellation endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use common::{OrderId, UserId};
use coordinator::{
    CreateOrderOutcome, InventoryService, OrderSagaCoordinator, PaymentService,
};
use domain::{Order, OrderRepository, OrderStatus, ProductId, ShippingAddress};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<R, I, P> {
    pub coordinator: Arc<OrderSagaCoordinator<R, I, P>>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Option<String>,
    pub items: Vec<OrderItemRequest>,
    pub shipping_address: ShippingAddress,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub payment_intent_id: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderResponse,
    pub payment_confirmation_handle: String,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        OrderResponse {
            id: order.id().to_string(),
            user_id: order.user_id().to_string(),
            status: order.status(),
            total_cents: order.total_amount().cents(),
            payment_intent_id: order.payment_intent_id().map(str::to_string),
            items: order
                .items()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    total_price_cents: item.total_price.cents(),
                })
                .collect(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

// -- Handlers --

/// POST /orders — run the create-order saga.
#[tracing::instrument(skip(state, req))]
pub async fn create<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(axum::http::StatusCode, Json<CreateOrderResponse>), ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    let user_id = if let Some(ref id_str) = req.user_id {
        let uuid = uuid::Uuid::parse_str(id_str)
            .map_err(|e| ApiError::BadRequest(format!("Invalid user_id: {e}")))?;
        UserId::from_uuid(uuid)
    } else {
        UserId::new()
    };

    let request = coordinator::CreateOrderRequest {
        user_id,
        items: req
            .items
            .iter()
            .map(|item| coordinator::OrderItemRequest {
                product_id: ProductId::new(item.product_id.as_str()),
                quantity: item.quantity,
            })
            .collect(),
        shipping_address: req.shipping_address,
    };

    let CreateOrderOutcome {
        order,
        confirmation_handle,
    } = state.coordinator.create_order(request).await?;

    let response = CreateOrderResponse {
        order: OrderResponse::from(&order),
        payment_confirmation_handle: confirmation_handle,
    };
    Ok((axum::http::StatusCode::CREATED, Json(response)))
}

/// GET /orders/:id — load an order by ID.
#[tracing::instrument(skip(state))]
pub async fn get<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.get_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// PUT /orders/:id/status — admin-driven forward transition.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.update_status(order_id, req.status).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// POST /orders/:id/cancel — cancel an unconfirmed order.
#[tracing::instrument(skip(state))]
pub async fn cancel<R, I, P>(
    State(state): State<Arc<AppState<R, I, P>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    R: OrderRepository + 'static,
    I: InventoryService + 'static,
    P: PaymentService + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.coordinator.cancel_order(order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    uuid::Uuid::parse_str(id)
        .map(OrderId::from_uuid)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))
}
