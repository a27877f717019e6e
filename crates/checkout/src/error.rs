//! Checkout error types.

use common::AggregateId;
use thiserror::Error;

/// Errors raised by the checkout coordinator and fulfillment service.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("order not found: {0}")]
    OrderNotFound(AggregateId),

    /// The cart cannot be checked out as it stands.
    #[error("cart not ready for checkout: {0}")]
    CartNotReady(String),

    /// The ledger refused a line during checkout; the run has been
    /// compensated.
    #[error("stock commit failed for product {product_id}: {source}")]
    StockCommit {
        product_id: domain::ProductId,
        #[source]
        source: crate::services::stock::StockError,
    },

    #[error("domain error: {0}")]
    Domain(#[from] domain::DomainError),

    #[error("event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
