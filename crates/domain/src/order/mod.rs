//! Cart and order lifecycle.

mod aggregate;
mod commands;
mod error;
mod events;
mod registry;
mod service;
mod status;

pub use aggregate::Order;
pub use commands::{
    AddItem, CheckOut, ClearCart, RecordPayment, RemoveItem, SellerTransition, SetQuantity,
};
pub use error::OrderError;
pub use events::{LineAddedData, OrderEvent};
pub use registry::CartRegistry;
pub use service::{CartService, CartView, SellerGroup};
pub use status::OrderStatus;
