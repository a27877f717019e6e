//! Events emitted by the product aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::values::{CategoryId, Money, ProductId, SellerId};

/// Everything that can happen to a product listing and its stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProductEvent {
    /// A seller put a product on the marketplace.
    Listed {
        product_id: ProductId,
        seller_id: SellerId,
        name: String,
        description: String,
        price: Money,
        category_id: Option<CategoryId>,
        initial_stock: u32,
        listed_at: DateTime<Utc>,
    },

    /// Listing fields changed. Only the fields present moved.
    DetailsUpdated {
        name: Option<String>,
        description: Option<String>,
        price: Option<Money>,
        category_id: Option<CategoryId>,
    },

    /// Stock was set to an absolute count by the seller.
    StockSet { quantity: u32 },

    /// Stock moved by a delta: negative when committed to an order,
    /// positive when restored or restocked.
    StockAdjusted { delta: i64, new_stock: u32 },

    /// The listing was withdrawn from the catalog.
    DelistedAt { delisted_at: DateTime<Utc> },
}

impl ProductEvent {
    pub fn stock_adjusted(delta: i64, new_stock: u32) -> Self {
        ProductEvent::StockAdjusted { delta, new_stock }
    }

    pub fn delisted() -> Self {
        ProductEvent::DelistedAt {
            delisted_at: Utc::now(),
        }
    }
}

impl DomainEvent for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::Listed { .. } => "ProductListed",
            ProductEvent::DetailsUpdated { .. } => "ProductDetailsUpdated",
            ProductEvent::StockSet { .. } => "ProductStockSet",
            ProductEvent::StockAdjusted { .. } => "ProductStockAdjusted",
            ProductEvent::DelistedAt { .. } => "ProductDelisted",
        }
    }
}
