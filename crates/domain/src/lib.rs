//! Marketplace domain model.
//!
//! The cart/order aggregate and the product aggregate, their services,
//! and the command infrastructure that persists their events.

pub mod aggregate;
pub mod command;
pub mod directory;
pub mod error;
pub mod order;
pub mod product;
pub mod values;

pub use aggregate::{Aggregate, DomainEvent, SnapshotCapable};
pub use command::{CommandHandler, CommandResult, CONFLICT_RETRIES};
pub use directory::{InMemoryUserDirectory, Role, UserDirectory, require_buyer, require_seller};
pub use error::DomainError;
pub use order::{
    CartRegistry, CartService, CartView, Order, OrderError, OrderEvent, OrderStatus, SellerGroup,
};
pub use product::{ListProduct, Product, ProductError, ProductEvent, ProductPatch, ProductService};
pub use values::{
    BuyerId, CartLine, CategoryId, Money, PaymentMethod, PaymentRecord, ProductId, SellerId,
};
