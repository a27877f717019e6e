//! Product listing and catalog endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use domain::{CategoryId, ListProduct, Money, ProductId, ProductPatch, SellerId};
use event_store::EventStore;
use projections::views::catalog::CatalogEntry;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AppState, parse_aggregate_id};
use crate::error::ApiError;
use crate::extract::UserId;

// -- Request types --

#[derive(Deserialize)]
pub struct ListProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: i64,
    pub category_id: Option<Uuid>,
    pub initial_stock: u32,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<Uuid>,
    pub stock: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub delta: i64,
}

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub seller: Option<Uuid>,
    pub category: Option<Uuid>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub product_id: String,
    pub seller_id: String,
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub category_id: Option<String>,
    pub stock: u32,
    pub available: bool,
}

impl From<CatalogEntry> for ProductResponse {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            product_id: entry.product_id.to_string(),
            seller_id: entry.seller_id.to_string(),
            name: entry.name.clone(),
            description: entry.description.clone(),
            price_cents: entry.price.cents(),
            category_id: entry.category_id.map(|c| c.to_string()),
            stock: entry.stock,
            available: entry.is_available(),
        }
    }
}

#[derive(Serialize)]
pub struct ProductListedResponse {
    pub product_id: String,
}

#[derive(Serialize)]
pub struct StockResponse {
    pub product_id: String,
    pub stock: u32,
}

// -- Handlers --

/// POST /products — lists a new product for the calling seller.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
    Json(req): Json<ListProductRequest>,
) -> Result<(StatusCode, Json<ProductListedResponse>), ApiError> {
    let product_id = state
        .products
        .list_product(
            user,
            ListProduct {
                name: req.name,
                description: req.description,
                price: Money::from_cents(req.price_cents),
                category_id: req.category_id.map(CategoryId::from_uuid),
                initial_stock: req.initial_stock,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ProductListedResponse {
            product_id: product_id.to_string(),
        }),
    ))
}

/// GET /products — browsable catalog, filterable by seller or category.
#[tracing::instrument(skip(state))]
pub async fn list<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    state.catch_up().await?;

    let entries = match (query.seller, query.category) {
        (Some(seller), _) => {
            state
                .catalog
                .by_seller(SellerId::from_uuid(seller))
                .await
        }
        (None, Some(category)) => {
            state
                .catalog
                .by_category(CategoryId::from_uuid(category))
                .await
        }
        (None, None) => state.catalog.available().await,
    };

    Ok(Json(entries.into_iter().map(ProductResponse::from).collect()))
}

/// GET /products/:id — one catalog entry.
#[tracing::instrument(skip(state))]
pub async fn get<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    state.catch_up().await?;

    let product_id = ProductId::from_uuid(parse_aggregate_id(&id)?.into());
    let entry = state
        .catalog
        .get(product_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("product {id} not found")))?;

    Ok(Json(ProductResponse::from(entry)))
}

/// PATCH /products/:id — updates listing details as the owning seller.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<StatusCode, ApiError> {
    let product_id = ProductId::from_uuid(parse_aggregate_id(&id)?.into());

    state
        .products
        .update_product(
            user,
            product_id,
            ProductPatch {
                name: req.name,
                description: req.description,
                price: req.price_cents.map(Money::from_cents),
                category_id: req.category_id.map(CategoryId::from_uuid),
                stock: req.stock,
            },
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/:id/stock — adjusts stock as the owning seller.
#[tracing::instrument(skip(state))]
pub async fn adjust_stock<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
    Path(id): Path<String>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let product_id = ProductId::from_uuid(parse_aggregate_id(&id)?.into());

    let stock = state
        .products
        .adjust_stock_for_seller(user, product_id, req.delta)
        .await?;

    Ok(Json(StockResponse {
        product_id: product_id.to_string(),
        stock,
    }))
}

/// DELETE /products/:id — takes the listing off the marketplace.
#[tracing::instrument(skip(state))]
pub async fn delist<S: EventStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    UserId(user): UserId,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let product_id = ProductId::from_uuid(parse_aggregate_id(&id)?.into());
    state.products.delist_product(user, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
