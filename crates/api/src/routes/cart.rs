//! Cart endpoints for the calling buyer.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use domain::{Aggregate, CartView, ProductId};
use event_store::EventStore;
use serde::{Deserialize, Serialize};

use super::{AppState, parse_aggregate_id};
use crate::error::ApiError;
use crate::extract::UserId;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct SellerGroupResponse {
    pub seller_id: String,
    pub subtotal_cents: i64,
    pub lines: Vec<CartLineResponse>,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: String,
    pub status: String,
    pub total_cents: i64,
    pub item_count: u32,
    pub sellers: Vec<SellerGroupResponse>,
}

impl From<CartView> for CartResponse {
    fn from(view: CartView) -> Self {
        Self {
            cart_id: view.cart_id.to_string(),
            status: view.status.to_string(),
            total_cents: view.total.cents(),
            item_count: view.item_count,
            sellers: view
                .seller_groups
                .into_iter()
                .map(|group| SellerGroupResponse {
                    seller_id: group.seller_id.to_string(),
                    subtotal_cents: group.subtotal.cents(),
                    lines: group
                        .lines
                        .into_iter()
                        .map(|line| CartLineResponse {
                            product_id: line.product_id.to_string(),
                            product_name: line.product_name.clone(),
                            quantity: line.quantity,
                            unit_price_cents: line.unit_price.cents(),
                            line_total_cents: line.line_total().cents(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub run_id: String,
}

// -- Handlers --

/// GET /cart — the buyer's cart, grouped by seller.
#[tracing::instrument(skip(state))]
pub async fn view<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
) -> Result<Json<CartResponse>, ApiError> {
    let snapshot = state.carts.snapshot(user).await?;
    Ok(Json(CartResponse::from(snapshot)))
}

/// POST /cart/items — adds a product to the cart, merging with any
/// existing line for the same product.
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), ApiError> {
    let product_id = ProductId::from_uuid(parse_aggregate_id(&req.product_id)?.into());

    state.carts.add_item(user, product_id, req.quantity).await?;
    let snapshot = state.carts.snapshot(user).await?;
    Ok((StatusCode::CREATED, Json(CartResponse::from(snapshot))))
}

/// PUT /cart/items/:product_id — replaces a line's quantity; zero or
/// negative removes the line.
#[tracing::instrument(skip(state, req))]
pub async fn set_quantity<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
    Path(product_id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id = ProductId::from_uuid(parse_aggregate_id(&product_id)?.into());

    state.carts.set_quantity(user, product_id, req.quantity).await?;
    let snapshot = state.carts.snapshot(user).await?;
    Ok(Json(CartResponse::from(snapshot)))
}

/// DELETE /cart/items/:product_id — removes one line.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
    Path(product_id): Path<String>,
) -> Result<Json<CartResponse>, ApiError> {
    let product_id = ProductId::from_uuid(parse_aggregate_id(&product_id)?.into());

    state.carts.remove_item(user, product_id).await?;
    let snapshot = state.carts.snapshot(user).await?;
    Ok(Json(CartResponse::from(snapshot)))
}

/// DELETE /cart — empties the cart. Idempotent.
#[tracing::instrument(skip(state))]
pub async fn clear<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
) -> Result<Json<CartResponse>, ApiError> {
    state.carts.clear(user).await?;
    let snapshot = state.carts.snapshot(user).await?;
    Ok(Json(CartResponse::from(snapshot)))
}

/// POST /cart/checkout — commits stock for every line and turns the
/// cart into a pending order.
#[tracing::instrument(skip(state))]
pub async fn check_out<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let cart = state.carts.get_or_create_cart(user).await?;
    let order_id = cart
        .id()
        .ok_or_else(|| ApiError::Internal("cart has no stream".to_string()))?;

    let run_id = state.coordinator.check_out(order_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: order_id.to_string(),
            run_id: run_id.to_string(),
        }),
    ))
}
