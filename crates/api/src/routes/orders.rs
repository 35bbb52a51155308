//! Order endpoints: checkout, lookup, lifecycle transitions, cancellation.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId};
use domain::{OrderLineRequest, OrderListQuery, OrderView};
use serde::{Deserialize, Serialize};
use store::ShopStore;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CheckoutItemRequest>,
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
pub struct CheckoutItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub subtotal_cents: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub created_at: String,
    pub status: String,
    pub total_cents: i64,
    pub payment_method: Option<String>,
    pub items: Vec<OrderItemResponse>,
}

fn order_response(view: OrderView) -> OrderResponse {
    OrderResponse {
        id: view.id.to_string(),
        user_id: view.user_id.to_string(),
        created_at: view.created_at.to_rfc3339(),
        status: view.status.to_string(),
        total_cents: view.total.cents(),
        payment_method: view.payment_method,
        items: view
            .items
            .into_iter()
            .map(|item| OrderItemResponse {
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price.cents(),
                subtotal_cents: item.subtotal.cents(),
            })
            .collect(),
    }
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

// -- Handlers --

/// POST /orders — checkout: validate, price, and commit the order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let items: Vec<OrderLineRequest> = req
        .items
        .into_iter()
        .map(|item| OrderLineRequest {
            product_id: ProductId::new(item.product_id),
            quantity: item.quantity,
        })
        .collect();

    let order = state
        .orders
        .checkout(principal.user_id, items, req.payment_method)
        .await?;

    Ok((StatusCode::CREATED, Json(order_response(order))))
}

/// GET /orders — the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_orders(principal, query).await?;
    Ok(Json(orders.into_iter().map(order_response).collect()))
}

/// GET /orders/{id} — load one order (owner or admin).
#[tracing::instrument(skip(state))]
pub async fn get<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.get_order(principal, order_id).await?;
    Ok(Json(order_response(order)))
}

/// PUT /orders/{id}/status — move the order along its lifecycle.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .update_status(principal, order_id, &req.status)
        .await?;
    Ok(Json(order_response(order)))
}

/// PUT /orders/{id}/cancel — cancel and restock (owner or admin).
#[tracing::instrument(skip(state))]
pub async fn cancel<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.orders.cancel(principal, order_id).await?;
    Ok(Json(order_response(order)))
}
