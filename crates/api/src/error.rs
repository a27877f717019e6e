//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, StockError};
use domain::{DomainError, OrderError, ProductError};
use event_store::EventStoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Caller identity missing or carrying the wrong role.
    Unauthorized(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Checkout or fulfillment error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    match &err {
        DomainError::Order(order_err) => match order_err {
            OrderError::InsufficientStock { .. }
            | OrderError::InvalidStateTransition { .. }
            | OrderError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
            OrderError::EmptyCart => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
            OrderError::LineNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
            OrderError::SellerNotOnOrder { .. } => (StatusCode::FORBIDDEN, err.to_string()),
            OrderError::InvalidQuantity { .. }
            | OrderError::InvalidPrice { .. }
            | OrderError::BuyerRequired
            | OrderError::AlreadyOpen => (StatusCode::BAD_REQUEST, err.to_string()),
        },
        DomainError::Product(product_err) => match product_err {
            ProductError::InsufficientStock { .. } | ProductError::AlreadyListed => {
                (StatusCode::CONFLICT, err.to_string())
            }
            ProductError::NotListed => (StatusCode::NOT_FOUND, err.to_string()),
            ProductError::Delisted => (StatusCode::GONE, err.to_string()),
            ProductError::NotOwner { .. } => (StatusCode::FORBIDDEN, err.to_string()),
            ProductError::InvalidName
            | ProductError::InvalidPrice { .. }
            | ProductError::StockOutOfRange { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        },
        DomainError::AggregateNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, err.to_string()),
        DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::CartNotReady(_) => (StatusCode::CONFLICT, err.to_string()),
        CheckoutError::StockCommit { ref source, .. } => match source {
            StockError::Insufficient { .. } => (StatusCode::CONFLICT, err.to_string()),
            StockError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
            StockError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        },
        CheckoutError::Domain(inner) => domain_error_to_response(inner),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}
