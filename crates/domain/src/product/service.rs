//! Product service: catalog management and the stock ledger.

use std::sync::Arc;

use event_store::EventStore;
use uuid::Uuid;

use super::aggregate::Product;
use super::commands::{ListProduct, ProductPatch};
use crate::aggregate::Aggregate;
use crate::command::CommandHandler;
use crate::directory::{UserDirectory, require_seller};
use crate::error::DomainError;
use crate::values::{ProductId, SellerId};

/// Seller-facing catalog operations plus the ledger adjustments the
/// checkout flow drives.
pub struct ProductService<S: EventStore + Clone> {
    products: CommandHandler<S, Product>,
    directory: Arc<dyn UserDirectory>,
}

impl<S: EventStore + Clone> ProductService<S> {
    pub fn new(store: S, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            products: CommandHandler::new(store),
            directory,
        }
    }

    /// Lists a new product for the calling seller.
    #[tracing::instrument(skip(self, cmd), fields(%user))]
    pub async fn list_product(&self, user: Uuid, cmd: ListProduct) -> Result<ProductId, DomainError> {
        let seller_id = require_seller(self.directory.as_ref(), user).await?;
        let product_id = ProductId::new();

        self.products
            .execute(product_id.as_aggregate(), |product| {
                product.list(
                    product_id,
                    seller_id,
                    cmd.name,
                    cmd.description,
                    cmd.price,
                    cmd.category_id,
                    cmd.initial_stock,
                )
            })
            .await?;

        tracing::info!(%product_id, %seller_id, "product listed");
        metrics::counter!("products_listed_total").increment(1);
        Ok(product_id)
    }

    /// Applies a partial update to the caller's own product.
    #[tracing::instrument(skip(self, patch), fields(%user, %product_id))]
    pub async fn update_product(
        &self,
        user: Uuid,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, DomainError> {
        let seller_id = require_seller(self.directory.as_ref(), user).await?;
        self.require_existing(product_id).await?;

        let result = self
            .products
            .execute(product_id.as_aggregate(), |product| {
                product.update(seller_id, patch)
            })
            .await?;
        Ok(result.aggregate)
    }

    /// Withdraws the caller's own product from the catalog.
    #[tracing::instrument(skip(self), fields(%user, %product_id))]
    pub async fn delist_product(&self, user: Uuid, product_id: ProductId) -> Result<(), DomainError> {
        let seller_id = require_seller(self.directory.as_ref(), user).await?;
        self.require_existing(product_id).await?;

        self.products
            .execute(product_id.as_aggregate(), |product| {
                product.delist(seller_id)
            })
            .await?;
        Ok(())
    }

    /// Restocks or corrects the caller's own product by a delta.
    #[tracing::instrument(skip(self), fields(%user, %product_id, delta))]
    pub async fn adjust_stock_for_seller(
        &self,
        user: Uuid,
        product_id: ProductId,
        delta: i64,
    ) -> Result<u32, DomainError> {
        let seller_id = require_seller(self.directory.as_ref(), user).await?;
        let product = self.get_product(product_id).await?;
        if product.seller_id() != Some(seller_id) {
            return Err(DomainError::Product(
                super::error::ProductError::NotOwner { seller_id },
            ));
        }
        self.adjust_stock(product_id, delta).await
    }

    /// Moves the ledger by a delta with conflict retry. No role check;
    /// this is the commit/restore primitive the order flows call.
    ///
    /// Each retry re-reads the live count, so two callers racing for
    /// the last units serialize: one commits, the other sees the
    /// depleted ledger and gets `InsufficientStock`.
    pub async fn adjust_stock(&self, product_id: ProductId, delta: i64) -> Result<u32, DomainError> {
        let result = self
            .products
            .execute_with_retry(product_id.as_aggregate(), |product| {
                product.adjust_stock(delta)
            })
            .await?;
        Ok(result.aggregate.stock())
    }

    /// Loads a product, or `NotFound`.
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, DomainError> {
        self.find_product(product_id)
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: Product::aggregate_type(),
                aggregate_id: product_id.to_string(),
            })
    }

    /// Loads a product if its stream exists.
    pub async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>, DomainError> {
        self.products.load_existing(product_id.as_aggregate()).await
    }

    async fn require_existing(&self, product_id: ProductId) -> Result<(), DomainError> {
        self.get_product(product_id).await.map(|_| ())
    }
}
