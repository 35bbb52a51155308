//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CartItemId, ProductId};
use domain::CartView;
use serde::{Deserialize, Serialize};
use store::ShopStore;
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

// -- Request types --

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub item_id: String,
    pub product_id: String,
    pub product_name: String,
    pub unit_price_cents: i64,
    pub quantity: u32,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub items: Vec<CartItemResponse>,
    pub total_cents: i64,
    pub item_count: u32,
}

fn cart_response(view: CartView) -> CartResponse {
    CartResponse {
        id: view.id.to_string(),
        total_cents: view.total().cents(),
        item_count: view.item_count(),
        items: view
            .lines
            .into_iter()
            .map(|line| {
                let line_total_cents = line.line_total().cents();
                CartItemResponse {
                    item_id: line.item_id.to_string(),
                    product_id: line.product.id.to_string(),
                    product_name: line.product.name,
                    unit_price_cents: line.product.price.cents(),
                    quantity: line.quantity,
                    line_total_cents,
                }
            })
            .collect(),
    }
}

fn parse_item_id(id: &str) -> Result<CartItemId, ApiError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid item ID format: {e}")))?;
    Ok(CartItemId::from_uuid(uuid))
}

// -- Handlers --

/// GET /cart — the caller's cart with derived totals.
#[tracing::instrument(skip(state))]
pub async fn get<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state.carts.get_cart(principal.user_id).await?;
    Ok(Json(cart_response(view)))
}

/// POST /cart/add — add a product, merging with an existing line.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state
        .carts
        .add_item(
            principal.user_id,
            ProductId::new(req.product_id),
            req.quantity,
        )
        .await?;
    Ok(Json(cart_response(view)))
}

/// PUT /cart/items/{id} — overwrite a line's quantity.
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id = parse_item_id(&id)?;
    let view = state
        .carts
        .update_item(principal.user_id, item_id, req.quantity)
        .await?;
    Ok(Json(cart_response(view)))
}

/// DELETE /cart/items/{id} — remove a line (idempotent).
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let item_id = parse_item_id(&id)?;
    let view = state.carts.remove_item(principal.user_id, item_id).await?;
    Ok(Json(cart_response(view)))
}

/// DELETE /cart/clear — remove every line (idempotent).
#[tracing::instrument(skip(state))]
pub async fn clear<S: ShopStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state.carts.clear(principal.user_id).await?;
    Ok(Json(cart_response(view)))
}
