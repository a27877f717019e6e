//! Route handlers and shared application state.

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod users;

use std::sync::Arc;

use checkout::{CheckoutCoordinator, FulfillmentService, LedgerStockGateway, NoopSellerNotifier};
use common::AggregateId;
use domain::{CartService, InMemoryUserDirectory, OrderStatus, ProductService};
use event_store::EventStore;
use projections::{BuyerOrdersView, CatalogView, ProjectionProcessor, SellerOrdersView};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore + Clone> {
    pub carts: CartService<S>,
    pub products: Arc<ProductService<S>>,
    pub coordinator: CheckoutCoordinator<S, LedgerStockGateway<S>, NoopSellerNotifier>,
    pub fulfillment: FulfillmentService<S, LedgerStockGateway<S>>,
    pub directory: InMemoryUserDirectory,
    pub catalog: Arc<CatalogView>,
    pub seller_orders: Arc<SellerOrdersView>,
    pub buyer_orders: Arc<BuyerOrdersView>,
    pub event_store: S,
    pub processor: Arc<ProjectionProcessor<S>>,
}

impl<S: EventStore + Clone> AppState<S> {
    /// Brings the read models up to date before a query handler reads
    /// them.
    pub async fn catch_up(&self) -> Result<(), ApiError> {
        self.processor
            .run_catch_up()
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))
    }
}

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid ID format: {e}")))?;
    Ok(AggregateId::from(uuid))
}

pub(crate) fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    match raw.to_ascii_lowercase().as_str() {
        "cart" => Ok(OrderStatus::Cart),
        "pending" => Ok(OrderStatus::Pending),
        "paid" => Ok(OrderStatus::Paid),
        "shipped" => Ok(OrderStatus::Shipped),
        "delivered" => Ok(OrderStatus::Delivered),
        "cancelled" => Ok(OrderStatus::Cancelled),
        other => Err(ApiError::BadRequest(format!(
            "unknown order status: {other}"
        ))),
    }
}
