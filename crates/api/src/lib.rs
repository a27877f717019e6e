//! HTTP API for the marketplace.
//!
//! REST endpoints over the catalog, buyer carts, checkout and seller
//! fulfillment, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post, put};
use checkout::{CheckoutCoordinator, FulfillmentService, LedgerStockGateway, NoopSellerNotifier};
use domain::{CartRegistry, CartService, InMemoryUserDirectory, ProductService, UserDirectory};
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use projections::{
    BuyerOrdersView, CatalogView, Projection, ProjectionProcessor, SellerOrdersView,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/users/buyers", post(routes::users::register_buyer::<S>))
        .route("/users/sellers", post(routes::users::register_seller::<S>))
        .route("/products", post(routes::products::create::<S>))
        .route("/products", get(routes::products::list::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/products/{id}", patch(routes::products::update::<S>))
        .route("/products/{id}", delete(routes::products::delist::<S>))
        .route(
            "/products/{id}/stock",
            post(routes::products::adjust_stock::<S>),
        )
        .route("/cart", get(routes::cart::view::<S>))
        .route("/cart", delete(routes::cart::clear::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{product_id}",
            put(routes::cart::set_quantity::<S>),
        )
        .route(
            "/cart/items/{product_id}",
            delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/checkout", post(routes::cart::check_out::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/{id}/payment",
            post(routes::orders::record_payment::<S>),
        )
        .route(
            "/orders/{id}/transition",
            post(routes::orders::transition::<S>),
        )
        .route("/orders/{id}/events", get(routes::orders::events::<S>))
        .route("/seller/orders", get(routes::orders::seller_orders::<S>))
        .route(
            "/checkout/runs/{id}",
            get(routes::orders::checkout_run::<S>),
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

/// Wires the default application state over the given event store: the
/// domain services, checkout backed by the product ledger, the read
/// models and the processor that feeds them.
pub fn create_default_state<S: EventStore + Clone + 'static>(event_store: S) -> Arc<AppState<S>> {
    let directory = InMemoryUserDirectory::new();
    let directory_arc: Arc<dyn UserDirectory> = Arc::new(directory.clone());
    let registry = CartRegistry::new();

    let products = Arc::new(ProductService::new(event_store.clone(), directory_arc.clone()));
    let carts = CartService::new(event_store.clone(), registry.clone(), directory_arc.clone());
    let coordinator = CheckoutCoordinator::new(
        event_store.clone(),
        registry,
        LedgerStockGateway::new(products.clone()),
        NoopSellerNotifier::new(),
    );
    let fulfillment = FulfillmentService::new(
        event_store.clone(),
        LedgerStockGateway::new(products.clone()),
        directory_arc,
    );

    let catalog = Arc::new(CatalogView::new());
    let seller_orders = Arc::new(SellerOrdersView::new());
    let buyer_orders = Arc::new(BuyerOrdersView::new());

    let mut processor = ProjectionProcessor::new(event_store.clone());
    processor.register(Box::new(catalog.as_ref().clone()) as Box<dyn Projection>);
    processor.register(Box::new(seller_orders.as_ref().clone()) as Box<dyn Projection>);
    processor.register(Box::new(buyer_orders.as_ref().clone()) as Box<dyn Projection>);
    let processor = Arc::new(processor);

    Arc::new(AppState {
        carts,
        products,
        coordinator,
        fulfillment,
        directory,
        catalog,
        seller_orders,
        buyer_orders,
        event_store,
        processor,
    })
}
