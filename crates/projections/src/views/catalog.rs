//! Catalog read model — browsable product listings.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{CategoryId, Money, ProductEvent, ProductId, SellerId};
use event_store::EventRecord;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One product as the catalog shows it.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub seller_id: SellerId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub category_id: Option<CategoryId>,
    pub stock: u32,
    pub delisted: bool,
}

impl CatalogEntry {
    /// Whether buyers can put this product in a cart.
    pub fn is_available(&self) -> bool {
        !self.delisted && self.stock > 0
    }
}

struct CatalogState {
    products: HashMap<ProductId, CatalogEntry>,
    position: ProjectionPosition,
}

/// Read model over every product listing, fed by product events.
#[derive(Clone)]
pub struct CatalogView {
    state: Arc<RwLock<CatalogState>>,
}

impl CatalogView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CatalogState {
                products: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get(&self, product_id: ProductId) -> Option<CatalogEntry> {
        self.state.read().await.products.get(&product_id).cloned()
    }

    /// Listings buyers can order right now, sorted by name.
    pub async fn available(&self) -> Vec<CatalogEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .products
            .values()
            .filter(|e| e.is_available())
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Available listings in one category.
    pub async fn by_category(&self, category_id: CategoryId) -> Vec<CatalogEntry> {
        let mut entries = self.available().await;
        entries.retain(|e| e.category_id == Some(category_id));
        entries
    }

    /// All of one seller's listings, delisted ones included.
    pub async fn by_seller(&self, seller_id: SellerId) -> Vec<CatalogEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<_> = state
            .products
            .values()
            .filter(|e| e.seller_id == seller_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

impl Default for CatalogView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for CatalogView {
    fn name(&self) -> &'static str {
        "CatalogView"
    }

    async fn handle(&self, record: &EventRecord) -> Result<()> {
        if record.aggregate_type != "Product" {
            let mut state = self.state.write().await;
            state.position = state.position.advance();
            return Ok(());
        }

        let event: ProductEvent = serde_json::from_value(record.payload.clone())?;
        let product_id = ProductId::from(record.aggregate_id);

        let mut state = self.state.write().await;
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
                state.products.insert(
                    product_id,
                    CatalogEntry {
                        product_id,
                        seller_id,
                        name,
                        description,
                        price,
                        category_id,
                        stock: initial_stock,
                        delisted: false,
                    },
                );
            }
            ProductEvent::DetailsUpdated {
                name,
                description,
                price,
                category_id,
            } => {
                if let Some(entry) = state.products.get_mut(&product_id) {
                    if let Some(name) = name {
                        entry.name = name;
                    }
                    if let Some(description) = description {
                        entry.description = description;
                    }
                    if let Some(price) = price {
                        entry.price = price;
                    }
                    if let Some(category_id) = category_id {
                        entry.category_id = Some(category_id);
                    }
                }
            }
            ProductEvent::StockSet { quantity } => {
                if let Some(entry) = state.products.get_mut(&product_id) {
                    entry.stock = quantity;
                }
            }
            ProductEvent::StockAdjusted { new_stock, .. } => {
                if let Some(entry) = state.products.get_mut(&product_id) {
                    entry.stock = new_stock;
                }
            }
            ProductEvent::DelistedAt { .. } => {
                if let Some(entry) = state.products.get_mut(&product_id) {
                    entry.delisted = true;
                }
            }
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.products.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for CatalogView {
    fn name(&self) -> &'static str {
        "CatalogView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.products.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::DomainEvent;
    use event_store::Version;

    fn record(product_id: ProductId, version: i64, event: &ProductEvent) -> EventRecord {
        EventRecord::builder()
            .aggregate_id(product_id.as_aggregate())
            .aggregate_type("Product")
            .event_type(event.event_type())
            .version(Version::new(version))
            .payload(event)
            .unwrap()
            .build()
    }

    fn listed(product_id: ProductId, seller_id: SellerId, name: &str, stock: u32) -> ProductEvent {
        ProductEvent::Listed {
            product_id,
            seller_id,
            name: name.to_string(),
            description: String::new(),
            price: Money::from_cents(500),
            category_id: None,
            initial_stock: stock,
            listed_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn listing_appears_in_catalog() {
        let view = CatalogView::new();
        let product_id = ProductId::new();
        let seller_id = SellerId::new();

        view.handle(&record(product_id, 1, &listed(product_id, seller_id, "Okra", 5)))
            .await
            .unwrap();

        let entry = view.get(product_id).await.unwrap();
        assert_eq!(entry.name, "Okra");
        assert!(entry.is_available());
        assert_eq!(view.by_seller(seller_id).await.len(), 1);
    }

    #[tokio::test]
    async fn depleted_stock_hides_listing() {
        let view = CatalogView::new();
        let product_id = ProductId::new();

        view.handle(&record(
            product_id,
            1,
            &listed(product_id, SellerId::new(), "Okra", 2),
        ))
        .await
        .unwrap();
        view.handle(&record(
            product_id,
            2,
            &ProductEvent::stock_adjusted(-2, 0),
        ))
        .await
        .unwrap();

        assert!(view.available().await.is_empty());
        // Still queryable directly.
        assert_eq!(view.get(product_id).await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn delisting_hides_but_keeps_seller_view() {
        let view = CatalogView::new();
        let product_id = ProductId::new();
        let seller_id = SellerId::new();

        view.handle(&record(
            product_id,
            1,
            &listed(product_id, seller_id, "Okra", 5),
        ))
        .await
        .unwrap();
        view.handle(&record(product_id, 2, &ProductEvent::delisted()))
            .await
            .unwrap();

        assert!(view.available().await.is_empty());
        assert_eq!(view.by_seller(seller_id).await.len(), 1);
    }

    #[tokio::test]
    async fn category_filter() {
        let view = CatalogView::new();
        let category = CategoryId::new();
        let in_cat = ProductId::new();
        let out_cat = ProductId::new();

        let mut event = listed(in_cat, SellerId::new(), "Tomatoes", 5);
        if let ProductEvent::Listed { category_id, .. } = &mut event {
            *category_id = Some(category);
        }
        view.handle(&record(in_cat, 1, &event)).await.unwrap();
        view.handle(&record(
            out_cat,
            1,
            &listed(out_cat, SellerId::new(), "Yams", 5),
        ))
        .await
        .unwrap();

        let entries = view.by_category(category).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].product_id, in_cat);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let view = CatalogView::new();
        let product_id = ProductId::new();
        view.handle(&record(
            product_id,
            1,
            &listed(product_id, SellerId::new(), "Okra", 5),
        ))
        .await
        .unwrap();

        view.reset().await.unwrap();
        assert!(view.get(product_id).await.is_none());
        assert_eq!(view.position().await.events_processed, 0);
    }
}
