//! Typed cart and order commands.
//!
//! Each mutation is its own command type carrying exactly the fields
//! that mutation needs, plus the identity of whoever is acting. The
//! service layer resolves identity against the user directory before
//! any command reaches the aggregate.

use serde::{Deserialize, Serialize};

use super::status::OrderStatus;
use crate::values::{BuyerId, PaymentMethod, ProductId, SellerId};

/// Put `quantity` units of a product in the buyer's cart. Merges into
/// an existing line for the same product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddItem {
    pub buyer_id: BuyerId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Replace a line's quantity. Zero removes the line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuantity {
    pub buyer_id: BuyerId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Drop a line from the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveItem {
    pub buyer_id: BuyerId,
    pub product_id: ProductId,
}

/// Empty the cart in one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearCart {
    pub buyer_id: BuyerId,
}

/// Turn the cart into a pending order, committing stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOut {
    pub buyer_id: BuyerId,
}

/// Record payment against a pending order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPayment {
    pub buyer_id: BuyerId,
    pub reference: String,
    pub method: PaymentMethod,
}

/// Move an order along its lifecycle on behalf of a seller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerTransition {
    pub seller_id: SellerId,
    pub target: OrderStatus,
    /// Free-form reason, recorded on cancellation.
    pub reason: Option<String>,
}
