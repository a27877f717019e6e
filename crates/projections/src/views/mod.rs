//! Read model views for the marketplace query side.

pub mod buyer_orders;
pub mod catalog;
pub mod seller_orders;

pub use buyer_orders::BuyerOrdersView;
pub use catalog::CatalogView;
pub use seller_orders::SellerOrdersView;
