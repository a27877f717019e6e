//! External collaborators of the checkout flow.

pub mod notifier;
pub mod stock;

pub use notifier::{NoopSellerNotifier, RecordingSellerNotifier, SellerNotifier};
pub use stock::{InMemoryStockGateway, LedgerStockGateway, StockError, StockGateway};
