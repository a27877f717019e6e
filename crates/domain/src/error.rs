//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::order::OrderError;
use crate::product::ProductError;

/// Errors surfaced by the domain services.
///
/// Every failed operation leaves prior state unchanged: command
/// methods reject before any event is appended, and appends are
/// atomic.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// Rejection from the cart/order aggregate.
    #[error("order error: {0}")]
    Order(OrderError),

    /// Rejection from the product aggregate.
    #[error("product error: {0}")]
    Product(ProductError),

    /// Entity absent.
    #[error("{aggregate_type} not found: {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    /// Caller lacks the role the operation requires.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when the failure is a lost optimistic-concurrency race and
    /// the caller may retry against fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        )
    }
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

impl From<ProductError> for DomainError {
    fn from(e: ProductError) -> Self {
        DomainError::Product(e)
    }
}
