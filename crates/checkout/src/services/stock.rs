//! Stock gateway: how checkout takes and returns ledger stock.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use domain::{DomainError, ProductError, ProductId, ProductService};
use event_store::EventStore;
use thiserror::Error;
use tokio::sync::RwLock;

/// Failures the gateway can report per line.
#[derive(Debug, Clone, Error)]
pub enum StockError {
    #[error("insufficient stock: {available} available")]
    Insufficient { available: u32 },

    #[error("product not found")]
    NotFound,

    #[error("stock gateway unavailable: {0}")]
    Unavailable(String),
}

/// Commits and releases units of a product's stock.
#[async_trait]
pub trait StockGateway: Send + Sync {
    /// Takes `quantity` units; returns the remaining stock.
    async fn commit(&self, product_id: ProductId, quantity: u32) -> Result<u32, StockError>;

    /// Returns `quantity` units; the compensation of `commit`.
    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<u32, StockError>;
}

/// Gateway backed by the product ledger. Commit and release are the
/// ledger's own adjust operation with opposite signs, so the event
/// stream of each product records exactly what checkout did.
pub struct LedgerStockGateway<S: EventStore + Clone> {
    products: Arc<ProductService<S>>,
}

impl<S: EventStore + Clone> LedgerStockGateway<S> {
    pub fn new(products: Arc<ProductService<S>>) -> Self {
        Self { products }
    }

    fn map_error(error: DomainError) -> StockError {
        match error {
            DomainError::Product(ProductError::InsufficientStock { available }) => {
                StockError::Insufficient { available }
            }
            DomainError::Product(ProductError::NotListed)
            | DomainError::AggregateNotFound { .. } => StockError::NotFound,
            other => StockError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl<S: EventStore + Clone> StockGateway for LedgerStockGateway<S> {
    async fn commit(&self, product_id: ProductId, quantity: u32) -> Result<u32, StockError> {
        self.products
            .adjust_stock(product_id, -(quantity as i64))
            .await
            .map_err(Self::map_error)
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<u32, StockError> {
        self.products
            .adjust_stock(product_id, quantity as i64)
            .await
            .map_err(Self::map_error)
    }
}

/// Map-backed gateway for tests, with failure toggles.
#[derive(Clone, Default)]
pub struct InMemoryStockGateway {
    stock: Arc<RwLock<HashMap<ProductId, u32>>>,
    fail_on_commit: Arc<AtomicBool>,
    fail_on_release: Arc<AtomicBool>,
}

impl InMemoryStockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_stock(&self, product_id: ProductId, quantity: u32) {
        self.stock.write().await.insert(product_id, quantity);
    }

    pub async fn stock_of(&self, product_id: ProductId) -> Option<u32> {
        self.stock.read().await.get(&product_id).copied()
    }

    /// Makes every commit fail, for compensation tests.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_on_release(&self, fail: bool) {
        self.fail_on_release.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StockGateway for InMemoryStockGateway {
    async fn commit(&self, product_id: ProductId, quantity: u32) -> Result<u32, StockError> {
        if self.fail_on_commit.load(Ordering::SeqCst) {
            return Err(StockError::Unavailable("commit failure injected".to_string()));
        }

        let mut stock = self.stock.write().await;
        let current = stock.get_mut(&product_id).ok_or(StockError::NotFound)?;
        if *current < quantity {
            return Err(StockError::Insufficient { available: *current });
        }
        *current -= quantity;
        Ok(*current)
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<u32, StockError> {
        if self.fail_on_release.load(Ordering::SeqCst) {
            return Err(StockError::Unavailable(
                "release failure injected".to_string(),
            ));
        }

        let mut stock = self.stock.write().await;
        let current = stock.entry(product_id).or_insert(0);
        *current += quantity;
        Ok(*current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn commit_and_release_roundtrip() {
        let gateway = InMemoryStockGateway::new();
        let product = ProductId::new();
        gateway.set_stock(product, 5).await;

        assert_eq!(gateway.commit(product, 3).await.unwrap(), 2);
        assert_eq!(gateway.release(product, 3).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn commit_rejects_overdraw() {
        let gateway = InMemoryStockGateway::new();
        let product = ProductId::new();
        gateway.set_stock(product, 2).await;

        let result = gateway.commit(product, 3).await;
        assert!(matches!(result, Err(StockError::Insufficient { available: 2 })));
        // Nothing was taken.
        assert_eq!(gateway.stock_of(product).await, Some(2));
    }

    #[tokio::test]
    async fn unknown_product() {
        let gateway = InMemoryStockGateway::new();
        let result = gateway.commit(ProductId::new(), 1).await;
        assert!(matches!(result, Err(StockError::NotFound)));
    }
}
