//! Read models and projections for the marketplace query side.
//!
//! - [`Projection`] processes events into read models
//! - [`ReadModel`] gives query access to denormalized data
//! - [`ProjectionProcessor`] feeds events from the store to projections
//! - Views: catalog, per-seller orders, buyer order history

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{BuyerOrdersView, CatalogView, SellerOrdersView};
