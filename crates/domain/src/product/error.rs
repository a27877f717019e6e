use thiserror::Error;

use crate::values::SellerId;

/// Rejections from the product aggregate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProductError {
    #[error("product already listed")]
    AlreadyListed,

    #[error("product not listed")]
    NotListed,

    #[error("product has been delisted")]
    Delisted,

    #[error("product name cannot be empty")]
    InvalidName,

    #[error("price must be positive, got {price} cents")]
    InvalidPrice { price: i64 },

    /// The ledger cannot go below zero.
    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: u32 },

    /// The ledger counts whole units in a u32.
    #[error("stock adjustment {delta} out of range")]
    StockOutOfRange { delta: i64 },

    /// Only the listing seller may change a product.
    #[error("seller {seller_id} does not own this product")]
    NotOwner { seller_id: SellerId },
}
