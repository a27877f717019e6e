//! The product aggregate: one listing and its stock ledger.

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use super::commands::ProductPatch;
use super::error::ProductError;
use super::events::ProductEvent;
use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::values::{CategoryId, Money, ProductId, SellerId};

/// A listed product. Its event stream is the authoritative stock
/// ledger: every reservation, restock, and correction is an event, so
/// the current count can always be re-derived.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    id: Option<AggregateId>,
    version: Version,
    seller_id: Option<SellerId>,
    name: String,
    description: String,
    price: Money,
    category_id: Option<CategoryId>,
    stock: u32,
    delisted: bool,
}

impl Product {
    pub fn product_id(&self) -> Option<ProductId> {
        self.id.map(ProductId::from)
    }

    pub fn seller_id(&self) -> Option<SellerId> {
        self.seller_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn category_id(&self) -> Option<CategoryId> {
        self.category_id
    }

    /// Units currently available to sell.
    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn is_delisted(&self) -> bool {
        self.delisted
    }

    /// Whether the product can be added to carts right now.
    pub fn is_available(&self) -> bool {
        !self.delisted && self.stock > 0
    }

    /// Lists the product. Valid only on a fresh stream.
    pub fn list(
        &self,
        product_id: ProductId,
        seller_id: SellerId,
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        category_id: Option<CategoryId>,
        initial_stock: u32,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        if self.id.is_some() {
            return Err(ProductError::AlreadyListed);
        }
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProductError::InvalidName);
        }
        if !price.is_positive() {
            return Err(ProductError::InvalidPrice {
                price: price.cents(),
            });
        }
        Ok(vec![ProductEvent::Listed {
            product_id,
            seller_id,
            name,
            description: description.into(),
            price,
            category_id,
            initial_stock,
            listed_at: chrono::Utc::now(),
        }])
    }

    /// Applies a partial update on behalf of the listing seller.
    pub fn update(
        &self,
        actor: SellerId,
        patch: ProductPatch,
    ) -> Result<Vec<ProductEvent>, ProductError> {
        self.ensure_owned_by(actor)?;

        if patch.is_empty() {
            return Ok(vec![]);
        }
        if let Some(name) = &patch.name
            && name.trim().is_empty()
        {
            return Err(ProductError::InvalidName);
        }
        if let Some(price) = patch.price
            && !price.is_positive()
        {
            return Err(ProductError::InvalidPrice {
                price: price.cents(),
            });
        }

        let mut events = Vec::new();
        if patch.name.is_some()
            || patch.description.is_some()
            || patch.price.is_some()
            || patch.category_id.is_some()
        {
            events.push(ProductEvent::DetailsUpdated {
                name: patch.name,
                description: patch.description,
                price: patch.price,
                category_id: patch.category_id,
            });
        }
        if let Some(stock) = patch.stock {
            events.push(ProductEvent::StockSet { quantity: stock });
        }
        Ok(events)
    }

    /// Moves stock by a delta. Negative deltas commit units to an
    /// order; positive deltas restock or restore. The count can never
    /// go below zero.
    pub fn adjust_stock(&self, delta: i64) -> Result<Vec<ProductEvent>, ProductError> {
        if self.id.is_none() {
            return Err(ProductError::NotListed);
        }
        if delta == 0 {
            return Ok(vec![]);
        }
        if delta < 0 && self.delisted {
            return Err(ProductError::Delisted);
        }

        let new_stock = (self.stock as i64)
            .checked_add(delta)
            .ok_or(ProductError::StockOutOfRange { delta })?;
        if new_stock < 0 {
            return Err(ProductError::InsufficientStock {
                available: self.stock,
            });
        }
        let new_stock =
            u32::try_from(new_stock).map_err(|_| ProductError::StockOutOfRange { delta })?;
        Ok(vec![ProductEvent::stock_adjusted(delta, new_stock)])
    }

    /// Withdraws the listing from the catalog. Idempotent.
    pub fn delist(&self, actor: SellerId) -> Result<Vec<ProductEvent>, ProductError> {
        self.ensure_owned_by(actor)?;

        if self.delisted {
            return Ok(vec![]);
        }
        Ok(vec![ProductEvent::delisted()])
    }

    fn ensure_owned_by(&self, actor: SellerId) -> Result<(), ProductError> {
        match self.seller_id {
            None => Err(ProductError::NotListed),
            Some(owner) if owner != actor => Err(ProductError::NotOwner { seller_id: actor }),
            Some(_) => Ok(()),
        }
    }
}

impl Aggregate for Product {
    type Event = ProductEvent;
    type Error = ProductError;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            ProductEvent::Listed {
                product_id,
                seller_id,
                name,
                description,
                price,
                category_id,
                initial_stock,
                ..
            } => {
                self.id = Some(product_id.as_aggregate());
                self.seller_id = Some(seller_id);
                self.name = name;
                self.description = description;
                self.price = price;
                self.category_id = category_id;
                self.stock = initial_stock;
            }
            ProductEvent::DetailsUpdated {
                name,
                description,
                price,
                category_id,
            } => {
                if let Some(name) = name {
                    self.name = name;
                }
                if let Some(description) = description {
                    self.description = description;
                }
                if let Some(price) = price {
                    self.price = price;
                }
                if let Some(category_id) = category_id {
                    self.category_id = Some(category_id);
                }
            }
            ProductEvent::StockSet { quantity } => {
                self.stock = quantity;
            }
            ProductEvent::StockAdjusted { new_stock, .. } => {
                self.stock = new_stock;
            }
            ProductEvent::DelistedAt { .. } => {
                self.delisted = true;
            }
        }
    }
}

impl SnapshotCapable for Product {}

#[cfg(test)]
mod tests {
    use super::*;

    fn listed_product() -> (Product, SellerId) {
        let mut product = Product::default();
        let seller = SellerId::new();
        let events = product
            .list(
                ProductId::new(),
                seller,
                "Plantains, bunch",
                "Fresh from the farm",
                Money::from_cents(800),
                None,
                20,
            )
            .unwrap();
        product.apply_events(events);
        (product, seller)
    }

    #[test]
    fn list_sets_initial_state() {
        let (product, seller) = listed_product();
        assert_eq!(product.seller_id(), Some(seller));
        assert_eq!(product.stock(), 20);
        assert!(product.is_available());
    }

    #[test]
    fn list_validates_inputs() {
        let product = Product::default();
        assert!(matches!(
            product.list(
                ProductId::new(),
                SellerId::new(),
                "  ",
                "",
                Money::from_cents(100),
                None,
                1,
            ),
            Err(ProductError::InvalidName)
        ));
        assert!(matches!(
            product.list(
                ProductId::new(),
                SellerId::new(),
                "Okra",
                "",
                Money::zero(),
                None,
                1,
            ),
            Err(ProductError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn update_requires_ownership() {
        let (product, _) = listed_product();
        let patch = ProductPatch {
            price: Some(Money::from_cents(900)),
            ..Default::default()
        };
        assert!(matches!(
            product.update(SellerId::new(), patch),
            Err(ProductError::NotOwner { .. })
        ));
    }

    #[test]
    fn update_applies_patch_fields() {
        let (mut product, seller) = listed_product();
        let patch = ProductPatch {
            price: Some(Money::from_cents(950)),
            stock: Some(5),
            ..Default::default()
        };
        let events = product.update(seller, patch).unwrap();
        assert_eq!(events.len(), 2);
        product.apply_events(events);

        assert_eq!(product.price(), Money::from_cents(950));
        assert_eq!(product.stock(), 5);
        assert_eq!(product.name(), "Plantains, bunch");
    }

    #[test]
    fn empty_patch_is_noop() {
        let (product, seller) = listed_product();
        assert!(product.update(seller, ProductPatch::default()).unwrap().is_empty());
    }

    #[test]
    fn stock_never_goes_negative() {
        let (mut product, _) = listed_product();
        let events = product.adjust_stock(-20).unwrap();
        product.apply_events(events);
        assert_eq!(product.stock(), 0);

        assert!(matches!(
            product.adjust_stock(-1),
            Err(ProductError::InsufficientStock { available: 0 })
        ));
    }

    #[test]
    fn stock_restores() {
        let (mut product, _) = listed_product();
        let events = product.adjust_stock(-5).unwrap();
        product.apply_events(events);
        let events = product.adjust_stock(5).unwrap();
        product.apply_events(events);
        assert_eq!(product.stock(), 20);
    }

    #[test]
    fn extreme_deltas_are_rejected_not_wrapped() {
        let (product, _) = listed_product();
        assert!(matches!(
            product.adjust_stock(i64::MAX),
            Err(ProductError::StockOutOfRange { .. })
        ));
        // Fits in i64 but not in the u32 the ledger counts in.
        assert!(matches!(
            product.adjust_stock(u32::MAX as i64),
            Err(ProductError::StockOutOfRange { .. })
        ));
        assert!(matches!(
            product.adjust_stock(i64::MIN),
            Err(ProductError::InsufficientStock { available: 20 })
        ));
    }

    #[test]
    fn zero_delta_is_noop() {
        let (product, _) = listed_product();
        assert!(product.adjust_stock(0).unwrap().is_empty());
    }

    #[test]
    fn delist_is_idempotent_and_blocks_commits() {
        let (mut product, seller) = listed_product();
        let events = product.delist(seller).unwrap();
        product.apply_events(events);
        assert!(product.is_delisted());
        assert!(!product.is_available());
        assert!(product.delist(seller).unwrap().is_empty());

        assert!(matches!(
            product.adjust_stock(-1),
            Err(ProductError::Delisted)
        ));
        // Restores still land, for cancellations after delisting.
        assert!(product.adjust_stock(3).is_ok());
    }
}
