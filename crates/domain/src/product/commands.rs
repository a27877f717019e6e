//! Typed product commands.

use serde::{Deserialize, Serialize};

use crate::values::{CategoryId, Money};

/// List a new product on the marketplace. The acting seller is
/// resolved by the service from the caller's identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: Option<CategoryId>,
    pub initial_stock: u32,
}

/// Partial update to a listing. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub category_id: Option<CategoryId>,
    /// Absolute stock count, replacing the current one.
    pub stock: Option<u32>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.category_id.is_none()
            && self.stock.is_none()
    }
}
