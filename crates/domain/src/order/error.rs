use thiserror::Error;

use super::status::OrderStatus;
use crate::values::{ProductId, SellerId};

/// Rejections from the order aggregate. A rejected command emits no
/// events, so the order is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderError {
    #[error("a cart must belong to a buyer")]
    BuyerRequired,

    #[error("cart already opened")]
    AlreadyOpen,

    /// The order's current state does not allow this action.
    #[error("cannot {action} while order is {current_status}")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// The requested status move is not in the transition table.
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("no line for product {product_id}")]
    LineNotFound { product_id: ProductId },

    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("invalid price: {price} cents")]
    InvalidPrice { price: i64 },

    /// Requested quantity exceeds what the ledger has.
    #[error("insufficient stock for product {product_id}: {available} available")]
    InsufficientStock { product_id: ProductId, available: u32 },

    #[error("cannot check out an empty cart")]
    EmptyCart,

    /// The acting seller has no line on this order.
    #[error("seller {seller_id} has no products on this order")]
    SellerNotOnOrder { seller_id: SellerId },
}
