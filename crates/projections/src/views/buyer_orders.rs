//! Buyer order history read model.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{BuyerId, Money, OrderEvent, OrderStatus};
use event_store::EventRecord;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One placed order in a buyer's history. Carts are excluded until
/// they check out.
#[derive(Debug, Clone)]
pub struct BuyerOrder {
    pub order_id: AggregateId,
    pub status: OrderStatus,
    pub total: Money,
    pub line_count: usize,
    pub placed_at: DateTime<Utc>,
}

struct BuyerOrdersState {
    /// Cart stream to owning buyer, tracked from CartOpened.
    owners: HashMap<AggregateId, BuyerId>,
    orders: HashMap<AggregateId, BuyerOrder>,
    by_buyer: HashMap<BuyerId, Vec<AggregateId>>,
    position: ProjectionPosition,
}

/// Read model of each buyer's placed orders, newest first.
#[derive(Clone)]
pub struct BuyerOrdersView {
    state: Arc<RwLock<BuyerOrdersState>>,
}

impl BuyerOrdersView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(BuyerOrdersState {
                owners: HashMap::new(),
                orders: HashMap::new(),
                by_buyer: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn orders_for(&self, buyer_id: BuyerId) -> Vec<BuyerOrder> {
        let state = self.state.read().await;
        let mut orders: Vec<BuyerOrder> = state
            .by_buyer
            .get(&buyer_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.orders.get(id).cloned())
            .collect();
        orders.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));
        orders
    }

    pub async fn get(&self, order_id: AggregateId) -> Option<BuyerOrder> {
        self.state.read().await.orders.get(&order_id).cloned()
    }
}

impl Default for BuyerOrdersView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for BuyerOrdersView {
    fn name(&self) -> &'static str {
        "BuyerOrdersView"
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
                state.owners.insert(order_id, buyer_id);
            }
            OrderEvent::CheckedOut {
                checked_out_at,
                total,
                line_count,
            } => {
                if let Some(buyer_id) = state.owners.get(&order_id).copied() {
                    state.orders.insert(
                        order_id,
                        BuyerOrder {
                            order_id,
                            status: OrderStatus::Pending,
                            total,
                            line_count,
                            placed_at: checked_out_at,
                        },
                    );
                    state.by_buyer.entry(buyer_id).or_default().push(order_id);
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
            // Line mutations only matter while the order is a cart.
            OrderEvent::LineAdded(_)
            | OrderEvent::LineQuantityChanged { .. }
            | OrderEvent::LineRemoved { .. }
            | OrderEvent::CartCleared { .. } => {}
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.owners.clear();
        state.orders.clear();
        state.by_buyer.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

fn set_status(state: &mut BuyerOrdersState, order_id: AggregateId, status: OrderStatus) {
    if let Some(order) = state.orders.get_mut(&order_id) {
        order.status = status;
    }
}

impl ReadModel for BuyerOrdersView {
    fn name(&self) -> &'static str {
        "BuyerOrdersView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}
