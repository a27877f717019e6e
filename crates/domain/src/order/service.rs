//! Cart service: the buyer-facing cart operations.

use std::collections::HashSet;
use std::sync::Arc;

use common::AggregateId;
use event_store::EventStore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::Order;
use super::error::OrderError;
use super::events::OrderEvent;
use super::registry::CartRegistry;
use super::status::OrderStatus;
use crate::aggregate::Aggregate;
use crate::command::{CONFLICT_RETRIES, CommandHandler};
use crate::directory::{UserDirectory, require_buyer};
use crate::error::DomainError;
use crate::product::Product;
use crate::values::{BuyerId, CartLine, Money, PaymentMethod, ProductId, SellerId};

/// Lines of one seller inside a cart view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SellerGroup {
    pub seller_id: SellerId,
    pub lines: Vec<CartLine>,
    /// Sum of line totals for this seller.
    pub subtotal: Money,
}

/// Read-side snapshot of a cart, grouped by seller so the buyer sees
/// which farm each line comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartView {
    pub cart_id: AggregateId,
    pub status: OrderStatus,
    pub total: Money,
    /// Sum of quantities across all lines.
    pub item_count: u32,
    pub seller_groups: Vec<SellerGroup>,
}

impl CartView {
    /// Builds the grouped view from an order. Groups and lines are
    /// sorted so the same cart always renders the same way.
    pub fn from_order(order: &Order) -> Option<Self> {
        let cart_id = order.id()?;

        let mut groups: Vec<SellerGroup> = Vec::new();
        for line in order.lines() {
            match groups.iter_mut().find(|g| g.seller_id == line.seller_id) {
                Some(group) => group.lines.push(line.clone()),
                None => groups.push(SellerGroup {
                    seller_id: line.seller_id,
                    lines: vec![line.clone()],
                    subtotal: Money::zero(),
                }),
            }
        }
        for group in &mut groups {
            group.lines.sort_by(|a, b| a.product_name.cmp(&b.product_name));
            group.subtotal = group.lines.iter().map(CartLine::line_total).sum();
        }
        groups.sort_by_key(|g| g.seller_id.as_uuid());

        Some(CartView {
            cart_id,
            status: order.status(),
            total: order.total(),
            item_count: order.item_count(),
            seller_groups: groups,
        })
    }
}

/// Buyer-facing cart operations.
///
/// Every stock check reads the product's live ledger in the same
/// attempt as the cart append; a lost race re-runs the whole attempt
/// against fresh state, so a quantity that no longer fits is rejected
/// rather than silently oversold.
pub struct CartService<S: EventStore + Clone> {
    orders: CommandHandler<S, Order>,
    products: CommandHandler<S, Product>,
    registry: CartRegistry,
    directory: Arc<dyn UserDirectory>,
}

impl<S: EventStore + Clone> CartService<S> {
    pub fn new(store: S, registry: CartRegistry, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            orders: CommandHandler::new(store.clone()),
            products: CommandHandler::new(store),
            registry,
            directory,
        }
    }

    /// The buyer's open cart, created on first use.
    #[tracing::instrument(skip(self), fields(%user))]
    pub async fn get_or_create_cart(&self, user: Uuid) -> Result<Order, DomainError> {
        let buyer_id = require_buyer(self.directory.as_ref(), user).await?;
        self.open_cart(buyer_id).await
    }

    /// Adds units of a product to the buyer's cart.
    #[tracing::instrument(skip(self), fields(%user, %product_id, quantity))]
    pub async fn add_item(
        &self,
        user: Uuid,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Order, DomainError> {
        let buyer_id = require_buyer(self.directory.as_ref(), user).await?;
        let cart = self.open_cart(buyer_id).await?;
        let cart_id = self.cart_id(&cart, buyer_id)?;

        // Re-fetch the live ledger on every attempt so a retry after a
        // lost race validates against what is actually left.
        let mut attempt = 0;
        loop {
            attempt += 1;

            let product = self.load_available_product(product_id).await?;
            let line = CartLine::new(
                product_id,
                product.name(),
                self.product_seller(&product, product_id)?,
                quantity,
                product.price(),
            );
            let stock = product.stock();

            match self
                .orders
                .execute_with_snapshot(cart_id, |order| order.add_line(line, stock))
                .await
            {
                Err(e) if e.is_conflict() && attempt < CONFLICT_RETRIES => {
                    tracing::debug!(%cart_id, attempt, "add_item lost a concurrency race, retrying");
                    metrics::counter!("cart_add_conflict_retries_total").increment(1);
                }
                Err(e) => return Err(e),
                Ok(result) => {
                    metrics::counter!("cart_items_added_total").increment(1);
                    return Ok(result.aggregate);
                }
            }
        }
    }

    /// Replaces a line's quantity. Zero or negative removes the line.
    #[tracing::instrument(skip(self), fields(%user, %product_id, quantity))]
    pub async fn set_quantity(
        &self,
        user: Uuid,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Order, DomainError> {
        let buyer_id = require_buyer(self.directory.as_ref(), user).await?;
        let cart = self.current_cart(buyer_id).await?;
        let cart_id = self.cart_id(&cart, buyer_id)?;

        if quantity <= 0 {
            let result = self
                .orders
                .execute_with_snapshot(cart_id, |order| order.remove_line(product_id))
                .await?;
            return Ok(result.aggregate);
        }
        let quantity = quantity as u32;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let product = self.load_available_product(product_id).await?;
            let stock = product.stock();

            match self
                .orders
                .execute_with_snapshot(cart_id, |order| {
                    order.set_line_quantity(product_id, quantity, stock)
                })
                .await
            {
                Err(e) if e.is_conflict() && attempt < CONFLICT_RETRIES => {
                    tracing::debug!(%cart_id, attempt, "set_quantity lost a concurrency race, retrying");
                }
                Err(e) => return Err(e),
                Ok(result) => return Ok(result.aggregate),
            }
        }
    }

    /// Drops a line from the buyer's cart.
    #[tracing::instrument(skip(self), fields(%user, %product_id))]
    pub async fn remove_item(&self, user: Uuid, product_id: ProductId) -> Result<Order, DomainError> {
        let buyer_id = require_buyer(self.directory.as_ref(), user).await?;
        let cart = self.current_cart(buyer_id).await?;
        let cart_id = self.cart_id(&cart, buyer_id)?;

        let result = self
            .orders
            .execute_with_snapshot(cart_id, |order| order.remove_line(product_id))
            .await?;
        Ok(result.aggregate)
    }

    /// Empties the buyer's cart.
    #[tracing::instrument(skip(self), fields(%user))]
    pub async fn clear(&self, user: Uuid) -> Result<Order, DomainError> {
        let buyer_id = require_buyer(self.directory.as_ref(), user).await?;
        let cart = self.current_cart(buyer_id).await?;
        let cart_id = self.cart_id(&cart, buyer_id)?;

        let result = self
            .orders
            .execute_with_snapshot(cart_id, |order| order.clear())
            .await?;
        Ok(result.aggregate)
    }

    /// The buyer's cart grouped by seller.
    #[tracing::instrument(skip(self), fields(%user))]
    pub async fn snapshot(&self, user: Uuid) -> Result<CartView, DomainError> {
        let order = self.get_or_create_cart(user).await?;
        CartView::from_order(&order).ok_or(DomainError::AggregateNotFound {
            aggregate_type: Order::aggregate_type(),
            aggregate_id: "cart".to_string(),
        })
    }

    /// Loads an order the buyer owns.
    pub async fn get_order(&self, user: Uuid, order_id: AggregateId) -> Result<Order, DomainError> {
        let buyer_id = require_buyer(self.directory.as_ref(), user).await?;
        let order = self
            .orders
            .load_existing(order_id)
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: Order::aggregate_type(),
                aggregate_id: order_id.to_string(),
            })?;
        if order.buyer_id() != Some(buyer_id) {
            return Err(DomainError::Unauthorized(format!(
                "order {order_id} does not belong to buyer {buyer_id}"
            )));
        }
        Ok(order)
    }

    /// Records the buyer's payment against their pending order.
    #[tracing::instrument(skip(self, reference), fields(%user, %order_id))]
    pub async fn record_payment(
        &self,
        user: Uuid,
        order_id: AggregateId,
        reference: String,
        method: PaymentMethod,
    ) -> Result<Order, DomainError> {
        // Ownership check doubles as the load.
        self.get_order(user, order_id).await?;

        let result = self
            .orders
            .execute_with_snapshot(order_id, |order| {
                order.record_payment(reference.clone(), method)
            })
            .await?;
        metrics::counter!("orders_paid_total").increment(1);
        Ok(result.aggregate)
    }

    /// Rebuilds the buyer-to-cart map from the event log: every
    /// `CartOpened` without a matching `CheckedOut` is re-attached to
    /// its buyer. Called at startup so a restart does not orphan open
    /// carts and mint a second one per buyer.
    #[tracing::instrument(skip(self))]
    pub async fn recover_open_carts(&self) -> Result<usize, DomainError> {
        let opened = self.orders.store().events_of_type("CartOpened").await?;
        let closed: HashSet<AggregateId> = self
            .orders
            .store()
            .events_of_type("CheckedOut")
            .await?
            .into_iter()
            .map(|record| record.aggregate_id)
            .collect();

        let mut recovered = 0;
        for record in opened {
            if closed.contains(&record.aggregate_id) {
                continue;
            }
            let event: OrderEvent = serde_json::from_value(record.payload)?;
            if let OrderEvent::CartOpened { buyer_id, .. } = event {
                self.registry.restore(buyer_id, record.aggregate_id).await;
                recovered += 1;
            }
        }
        if recovered > 0 {
            tracing::info!(recovered, "open carts recovered from the event log");
        }
        Ok(recovered)
    }

    async fn open_cart(&self, buyer_id: BuyerId) -> Result<Order, DomainError> {
        let (cart_id, created) = self.registry.open_cart(buyer_id).await;

        if created {
            let result = self
                .orders
                .execute(cart_id, |order| order.open(cart_id, buyer_id))
                .await?;
            tracing::info!(%cart_id, %buyer_id, "cart opened");
            metrics::counter!("carts_opened_total").increment(1);
            return Ok(result.aggregate);
        }

        let order = self.orders.load(cart_id).await?;
        // A registry entry pointing at a checked-out order means the
        // release at checkout has not been observed yet; open a fresh
        // cart instead of mutating the frozen one.
        if !order.status().can_modify_lines() {
            self.registry.release(buyer_id).await;
            return Box::pin(self.open_cart(buyer_id)).await;
        }
        Ok(order)
    }

    async fn current_cart(&self, buyer_id: BuyerId) -> Result<Order, DomainError> {
        match self.registry.current_cart(buyer_id).await {
            Some(cart_id) => self.orders.load(cart_id).await,
            None => Err(DomainError::AggregateNotFound {
                aggregate_type: Order::aggregate_type(),
                aggregate_id: format!("cart of buyer {buyer_id}"),
            }),
        }
    }

    fn cart_id(&self, cart: &Order, buyer_id: BuyerId) -> Result<AggregateId, DomainError> {
        cart.id().ok_or(DomainError::AggregateNotFound {
            aggregate_type: Order::aggregate_type(),
            aggregate_id: format!("cart of buyer {buyer_id}"),
        })
    }

    async fn load_available_product(&self, product_id: ProductId) -> Result<Product, DomainError> {
        let product = self
            .products
            .load_existing(product_id.as_aggregate())
            .await?
            .ok_or(DomainError::AggregateNotFound {
                aggregate_type: Product::aggregate_type(),
                aggregate_id: product_id.to_string(),
            })?;
        if product.is_delisted() {
            return Err(DomainError::AggregateNotFound {
                aggregate_type: Product::aggregate_type(),
                aggregate_id: product_id.to_string(),
            });
        }
        Ok(product)
    }

    fn product_seller(&self, product: &Product, product_id: ProductId) -> Result<SellerId, DomainError> {
        product.seller_id().ok_or(DomainError::AggregateNotFound {
            aggregate_type: Product::aggregate_type(),
            aggregate_id: product_id.to_string(),
        })
    }
}

impl<S: EventStore + Clone> CartService<S> {
    /// Propagates an `InsufficientStock` rejection with the live count
    /// already embedded, for callers mapping errors to responses.
    pub fn is_insufficient_stock(error: &DomainError) -> bool {
        matches!(
            error,
            DomainError::Order(OrderError::InsufficientStock { .. })
        )
    }
}
