//! Product listing and stock ledger.

mod aggregate;
mod commands;
mod error;
mod events;
mod service;

pub use aggregate::Product;
pub use commands::{ListProduct, ProductPatch};
pub use error::ProductError;
pub use events::ProductEvent;
pub use service::ProductService;
