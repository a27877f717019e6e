//! Seller orders read model — what each farm has to fulfill.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{BuyerId, CartLine, Money, OrderEvent, OrderStatus, ProductId, SellerId};
use event_store::EventRecord;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One order as a seller sees it: only that seller's lines, with the
/// seller's own subtotal.
#[derive(Debug, Clone)]
pub struct SellerOrder {
    pub order_id: AggregateId,
    pub buyer_id: BuyerId,
    pub status: OrderStatus,
    pub lines: Vec<CartLine>,
    pub subtotal: Money,
    pub placed_at: DateTime<Utc>,
}

/// Tracks carts while they are still mutable; an order only enters the
/// per-seller index at checkout.
struct PendingCart {
    buyer_id: Option<BuyerId>,
    lines: HashMap<ProductId, CartLine>,
}

struct SellerOrdersState {
    carts: HashMap<AggregateId, PendingCart>,
    orders: HashMap<AggregateId, Vec<SellerOrder>>,
    by_seller: HashMap<SellerId, Vec<AggregateId>>,
    position: ProjectionPosition,
}

/// Read model that splits each checked-out order per seller. Carts
/// never show up here; they are private to the buyer until checkout.
#[derive(Clone)]
pub struct SellerOrdersView {
    state: Arc<RwLock<SellerOrdersState>>,
}

impl SellerOrdersView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SellerOrdersState {
                carts: HashMap::new(),
                orders: HashMap::new(),
                by_seller: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    /// Every order carrying at least one of this seller's products,
    /// newest first.
    pub async fn orders_for(&self, seller_id: SellerId) -> Vec<SellerOrder> {
        let state = self.state.read().await;
        let mut orders: Vec<SellerOrder> = state
            .by_seller
            .get(&seller_id)
            .into_iter()
            .flatten()
            .filter_map(|order_id| {
                state
                    .orders
                    .get(order_id)
                    .and_then(|splits| splits.iter().find(|o| o.has_seller(seller_id)))
                    .cloned()
            })
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    /// This seller's orders in one status.
    pub async fn orders_for_with_status(
        &self,
        seller_id: SellerId,
        status: OrderStatus,
    ) -> Vec<SellerOrder> {
        let mut orders = self.orders_for(seller_id).await;
        orders.retain(|o| o.status == status);
        orders
    }

    /// One seller's slice of one order.
    pub async fn order_for_seller(
        &self,
        seller_id: SellerId,
        order_id: AggregateId,
    ) -> Option<SellerOrder> {
        let state = self.state.read().await;
        state
            .orders
            .get(&order_id)
            .and_then(|splits| splits.iter().find(|o| o.has_seller(seller_id)))
            .cloned()
    }
}

impl SellerOrder {
    fn has_seller(&self, seller_id: SellerId) -> bool {
        self.lines.iter().any(|l| l.seller_id == seller_id)
    }
}

impl Default for SellerOrdersView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for SellerOrdersView {
    fn name(&self) -> &'static str {
        "SellerOrdersView"
    }

    async fn handle(&self, record: &EventRecord) -> Result<()> {
        if record.aggregate_type != "Order" {
            let mut state = self.state.write().await;
            state.position = state.position.advance();
            return Ok(());
        }

        let event: OrderEvent = serde_json::from_value(record.payload.clone())?;
        let order_id = record.aggregate_id;

        let mut state = self.state.write().await;
        match event {
            OrderEvent::CartOpened { buyer_id, .. } => {
                state.carts.insert(
                    order_id,
                    PendingCart {
                        buyer_id: Some(buyer_id),
                        lines: HashMap::new(),
                    },
                );
            }
            OrderEvent::LineAdded(data) => {
                if let Some(cart) = state.carts.get_mut(&order_id) {
                    cart.lines.insert(
                        data.product_id,
                        CartLine::new(
                            data.product_id,
                            data.product_name,
                            data.seller_id,
                            data.quantity,
                            data.unit_price,
                        ),
                    );
                }
            }
            OrderEvent::LineQuantityChanged {
                product_id,
                new_quantity,
                ..
            } => {
                if let Some(cart) = state.carts.get_mut(&order_id)
                    && let Some(line) = cart.lines.get_mut(&product_id)
                {
                    line.quantity = new_quantity;
                }
            }
            OrderEvent::LineRemoved { product_id } => {
                if let Some(cart) = state.carts.get_mut(&order_id) {
                    cart.lines.remove(&product_id);
                }
            }
            OrderEvent::CartCleared { .. } => {
                if let Some(cart) = state.carts.get_mut(&order_id) {
                    cart.lines.clear();
                }
            }
            OrderEvent::CheckedOut { checked_out_at, .. } => {
                if let Some(cart) = state.carts.remove(&order_id)
                    && let Some(buyer_id) = cart.buyer_id
                {
                    // One split per seller holding that seller's lines.
                    let mut per_seller: HashMap<SellerId, Vec<CartLine>> = HashMap::new();
                    for line in cart.lines.into_values() {
                        per_seller.entry(line.seller_id).or_default().push(line);
                    }

                    let mut splits = Vec::with_capacity(per_seller.len());
                    for (seller_id, mut lines) in per_seller {
                        lines.sort_by(|a, b| a.product_name.cmp(&b.product_name));
                        let subtotal = lines.iter().map(CartLine::line_total).sum();
                        splits.push(SellerOrder {
                            order_id,
                            buyer_id,
                            status: OrderStatus::Pending,
                            lines,
                            subtotal,
                            placed_at: checked_out_at,
                        });
                        state.by_seller.entry(seller_id).or_default().push(order_id);
                    }
                    state.orders.insert(order_id, splits);
                }
            }
            OrderEvent::OrderPaid { .. } => set_status(&mut state, order_id, OrderStatus::Paid),
            OrderEvent::OrderShipped { .. } => {
                set_status(&mut state, order_id, OrderStatus::Shipped)
            }
            OrderEvent::OrderDelivered { .. } => {
                set_status(&mut state, order_id, OrderStatus::Delivered)
            }
            OrderEvent::OrderCancelled { .. } => {
                set_status(&mut state, order_id, OrderStatus::Cancelled)
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
        state.carts.clear();
        state.orders.clear();
        state.by_seller.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

fn set_status(state: &mut SellerOrdersState, order_id: AggregateId, status: OrderStatus) {
    if let Some(splits) = state.orders.get_mut(&order_id) {
        for split in splits {
            split.status = status;
        }
    }
}

impl ReadModel for SellerOrdersView {
    fn name(&self) -> &'static str {
        "SellerOrdersView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}
