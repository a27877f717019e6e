//! The order aggregate: a buyer's cart that becomes an order.

use std::collections::HashMap;

use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use super::error::OrderError;
use super::events::OrderEvent;
use super::status::OrderStatus;
use crate::aggregate::{Aggregate, SnapshotCapable};
use crate::values::{BuyerId, CartLine, Money, PaymentMethod, PaymentRecord, ProductId, SellerId};

/// One order, from open cart through delivery.
///
/// While `status` is `Cart` the lines are mutable and `total` tracks
/// them. Checkout freezes both; after that only status moves remain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    buyer_id: Option<BuyerId>,
    status: OrderStatus,
    lines: HashMap<ProductId, CartLine>,
    total: Money,
    payment: Option<PaymentRecord>,
}

impl Order {
    pub fn buyer_id(&self) -> Option<BuyerId> {
        self.buyer_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.values()
    }

    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.get(&product_id)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of quantities across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.values().map(|l| l.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn payment(&self) -> Option<&PaymentRecord> {
        self.payment.as_ref()
    }

    /// Whether the given seller owns at least one line.
    pub fn has_seller(&self, seller_id: SellerId) -> bool {
        self.lines.values().any(|l| l.seller_id == seller_id)
    }

    /// Sellers with at least one line on the order, deduplicated.
    pub fn sellers(&self) -> Vec<SellerId> {
        let mut sellers: Vec<SellerId> = self.lines.values().map(|l| l.seller_id).collect();
        sellers.sort_by_key(SellerId::as_uuid);
        sellers.dedup();
        sellers
    }

    /// Opens a new cart for a buyer. Valid only on a fresh stream.
    pub fn open(
        &self,
        order_id: AggregateId,
        buyer_id: BuyerId,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyOpen);
        }
        Ok(vec![OrderEvent::cart_opened(order_id, buyer_id)])
    }

    /// Adds units of a product to the cart, merging with an existing
    /// line for the same product.
    ///
    /// `available_stock` is the ledger's current count for the product;
    /// the merged quantity must fit within it. An existing line keeps
    /// its original price snapshot, even if the product price moved
    /// since.
    pub fn add_line(
        &self,
        line: CartLine,
        available_stock: u32,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_mutable("add a line to")?;

        if line.quantity == 0 {
            return Err(OrderError::InvalidQuantity { quantity: 0 });
        }
        if !line.unit_price.is_positive() {
            return Err(OrderError::InvalidPrice {
                price: line.unit_price.cents(),
            });
        }

        if let Some(existing) = self.lines.get(&line.product_id) {
            let merged = existing.quantity + line.quantity;
            if merged > available_stock {
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id,
                    available: available_stock,
                });
            }
            Ok(vec![OrderEvent::line_quantity_changed(
                line.product_id,
                existing.quantity,
                merged,
            )])
        } else {
            if line.quantity > available_stock {
                return Err(OrderError::InsufficientStock {
                    product_id: line.product_id,
                    available: available_stock,
                });
            }
            Ok(vec![OrderEvent::line_added(&line)])
        }
    }

    /// Replaces a line's quantity. Zero (or less, at the API surface)
    /// removes the line; setting the current quantity is a no-op.
    pub fn set_line_quantity(
        &self,
        product_id: ProductId,
        quantity: u32,
        available_stock: u32,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_mutable("change a line on")?;

        let existing = self
            .lines
            .get(&product_id)
            .ok_or(OrderError::LineNotFound { product_id })?;

        if quantity == 0 {
            return Ok(vec![OrderEvent::line_removed(product_id)]);
        }
        if quantity > available_stock {
            return Err(OrderError::InsufficientStock {
                product_id,
                available: available_stock,
            });
        }
        if quantity == existing.quantity {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::line_quantity_changed(
            product_id,
            existing.quantity,
            quantity,
        )])
    }

    /// Drops a line from the cart.
    pub fn remove_line(&self, product_id: ProductId) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_mutable("remove a line from")?;

        if !self.lines.contains_key(&product_id) {
            return Err(OrderError::LineNotFound { product_id });
        }
        Ok(vec![OrderEvent::line_removed(product_id)])
    }

    /// Empties the cart. Clearing an already empty cart is a no-op.
    pub fn clear(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_mutable("clear")?;

        if self.lines.is_empty() {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::cart_cleared()])
    }

    /// Turns the cart into a pending order, freezing lines and total.
    pub fn check_out(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_check_out() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "check out",
            });
        }
        if self.lines.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        Ok(vec![OrderEvent::checked_out(self.total, self.lines.len())])
    }

    /// Records payment against a pending order. The paid amount is the
    /// total frozen at checkout.
    pub fn record_payment(
        &self,
        reference: impl Into<String>,
        method: PaymentMethod,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Paid,
            });
        }
        Ok(vec![OrderEvent::paid(Some(PaymentRecord {
            reference: reference.into(),
            method,
            amount: self.total,
        }))])
    }

    /// Marks the order as handed to delivery.
    pub fn mark_shipped(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_transition(OrderStatus::Shipped)?;
        Ok(vec![OrderEvent::shipped()])
    }

    /// Marks the order as received by the buyer.
    pub fn mark_delivered(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_transition(OrderStatus::Delivered)?;
        Ok(vec![OrderEvent::delivered()])
    }

    /// Cancels a pending or paid order.
    pub fn cancel(
        &self,
        reason: impl Into<String>,
        cancelled_by: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_transition(OrderStatus::Cancelled)?;
        Ok(vec![OrderEvent::cancelled(reason, cancelled_by)])
    }

    /// Applies a status move on behalf of a seller, requiring the
    /// seller to own at least one line on the order.
    pub fn transition_by_seller(
        &self,
        seller_id: SellerId,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.has_seller(seller_id) {
            return Err(OrderError::SellerNotOnOrder { seller_id });
        }
        match target {
            OrderStatus::Paid => self.record_payment_by_seller(),
            OrderStatus::Shipped => self.mark_shipped(),
            OrderStatus::Delivered => self.mark_delivered(),
            OrderStatus::Cancelled => self.cancel(
                reason.unwrap_or_else(|| "cancelled by seller".to_string()),
                Some("seller".to_string()),
            ),
            other => Err(OrderError::InvalidTransition {
                from: self.status,
                to: other,
            }),
        }
    }

    // A seller confirming payment records no payment details; that
    // path exists for cash-on-meetup sales.
    fn record_payment_by_seller(&self) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status != OrderStatus::Pending {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: OrderStatus::Paid,
            });
        }
        Ok(vec![OrderEvent::paid(None)])
    }

    fn ensure_mutable(&self, action: &'static str) -> Result<(), OrderError> {
        if !self.status.can_modify_lines() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action,
            });
        }
        Ok(())
    }

    fn ensure_transition(&self, target: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition_to(target) {
            return Err(OrderError::InvalidTransition {
                from: self.status,
                to: target,
            });
        }
        Ok(())
    }

    // Derived, never incrementally adjusted. Replaying any event
    // sequence lands on the same total.
    fn recompute_total(&mut self) {
        self.total = self.lines.values().map(CartLine::line_total).sum();
    }
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
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
            OrderEvent::CartOpened {
                order_id, buyer_id, ..
            } => {
                self.id = Some(order_id);
                self.buyer_id = Some(buyer_id);
                self.status = OrderStatus::Cart;
            }
            OrderEvent::LineAdded(data) => {
                self.lines.insert(
                    data.product_id,
                    CartLine::new(
                        data.product_id,
                        data.product_name,
                        data.seller_id,
                        data.quantity,
                        data.unit_price,
                    ),
                );
                self.recompute_total();
            }
            OrderEvent::LineQuantityChanged {
                product_id,
                new_quantity,
                ..
            } => {
                if let Some(line) = self.lines.get_mut(&product_id) {
                    line.quantity = new_quantity;
                }
                self.recompute_total();
            }
            OrderEvent::LineRemoved { product_id } => {
                self.lines.remove(&product_id);
                self.recompute_total();
            }
            OrderEvent::CartCleared { .. } => {
                self.lines.clear();
                self.recompute_total();
            }
            OrderEvent::CheckedOut { total, .. } => {
                self.status = OrderStatus::Pending;
                // Frozen from here on.
                self.total = total;
            }
            OrderEvent::OrderPaid { payment, .. } => {
                self.status = OrderStatus::Paid;
                self.payment = payment;
            }
            OrderEvent::OrderShipped { .. } => {
                self.status = OrderStatus::Shipped;
            }
            OrderEvent::OrderDelivered { .. } => {
                self.status = OrderStatus::Delivered;
            }
            OrderEvent::OrderCancelled { .. } => {
                self.status = OrderStatus::Cancelled;
            }
        }
    }
}

impl SnapshotCapable for Order {}
