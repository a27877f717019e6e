//! Checkout coordination for the marketplace.
//!
//! A cart becomes an order only after every line's stock has been
//! committed against the ledger. This crate drives that commitment as
//! an event-sourced run with compensation: any line the ledger refuses
//! releases everything taken so far, in reverse, and leaves the cart
//! exactly as it was. It also carries the fulfillment service sellers
//! use to move placed orders through payment, shipping and delivery,
//! with cancellation restocking the ledger.

pub mod aggregate;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod fulfillment;
pub mod services;
pub mod state;

pub use aggregate::CheckoutRun;
pub use coordinator::CheckoutCoordinator;
pub use error::{CheckoutError, Result};
pub use events::CheckoutEvent;
pub use fulfillment::FulfillmentService;
pub use services::{
    InMemoryStockGateway, LedgerStockGateway, NoopSellerNotifier, RecordingSellerNotifier,
    SellerNotifier, StockError, StockGateway,
};
pub use state::CheckoutState;
