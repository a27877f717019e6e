//! Events emitted by the order aggregate.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::values::{BuyerId, CartLine, Money, PaymentRecord, ProductId};

/// Payload of a `LineAdded` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAddedData {
    pub product_id: ProductId,
    pub product_name: String,
    pub seller_id: crate::values::SellerId,
    pub quantity: u32,
    /// Price captured from the product at add time.
    pub unit_price: Money,
}

/// Everything that can happen to an order, from cart to delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// A buyer's cart was opened.
    CartOpened {
        order_id: AggregateId,
        buyer_id: BuyerId,
        opened_at: DateTime<Utc>,
    },

    /// A new product line entered the cart.
    LineAdded(LineAddedData),

    /// An existing line's quantity changed. The price snapshot on the
    /// line is untouched.
    LineQuantityChanged {
        product_id: ProductId,
        old_quantity: u32,
        new_quantity: u32,
    },

    /// A line left the cart.
    LineRemoved { product_id: ProductId },

    /// All lines left the cart at once.
    CartCleared { cleared_at: DateTime<Utc> },

    /// The cart became an order awaiting payment.
    CheckedOut {
        checked_out_at: DateTime<Utc>,
        /// Total frozen at checkout.
        total: Money,
        line_count: usize,
    },

    /// Payment was recorded against the order.
    OrderPaid {
        paid_at: DateTime<Utc>,
        payment: Option<PaymentRecord>,
    },

    /// The order was handed to delivery.
    OrderShipped { shipped_at: DateTime<Utc> },

    /// The buyer received the order.
    OrderDelivered { delivered_at: DateTime<Utc> },

    /// The order was cancelled before shipment.
    OrderCancelled {
        cancelled_at: DateTime<Utc>,
        reason: String,
        /// Who cancelled, when known.
        cancelled_by: Option<String>,
    },
}

impl OrderEvent {
    pub fn cart_opened(order_id: AggregateId, buyer_id: BuyerId) -> Self {
        OrderEvent::CartOpened {
            order_id,
            buyer_id,
            opened_at: Utc::now(),
        }
    }

    pub fn line_added(line: &CartLine) -> Self {
        OrderEvent::LineAdded(LineAddedData {
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            seller_id: line.seller_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        })
    }

    pub fn line_quantity_changed(product_id: ProductId, old_quantity: u32, new_quantity: u32) -> Self {
        OrderEvent::LineQuantityChanged {
            product_id,
            old_quantity,
            new_quantity,
        }
    }

    pub fn line_removed(product_id: ProductId) -> Self {
        OrderEvent::LineRemoved { product_id }
    }

    pub fn cart_cleared() -> Self {
        OrderEvent::CartCleared {
            cleared_at: Utc::now(),
        }
    }

    pub fn checked_out(total: Money, line_count: usize) -> Self {
        OrderEvent::CheckedOut {
            checked_out_at: Utc::now(),
            total,
            line_count,
        }
    }

    pub fn paid(payment: Option<PaymentRecord>) -> Self {
        OrderEvent::OrderPaid {
            paid_at: Utc::now(),
            payment,
        }
    }

    pub fn shipped() -> Self {
        OrderEvent::OrderShipped {
            shipped_at: Utc::now(),
        }
    }

    pub fn delivered() -> Self {
        OrderEvent::OrderDelivered {
            delivered_at: Utc::now(),
        }
    }

    pub fn cancelled(reason: impl Into<String>, cancelled_by: Option<String>) -> Self {
        OrderEvent::OrderCancelled {
            cancelled_at: Utc::now(),
            reason: reason.into(),
            cancelled_by,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::CartOpened { .. } => "CartOpened",
            OrderEvent::LineAdded(_) => "LineAdded",
            OrderEvent::LineQuantityChanged { .. } => "LineQuantityChanged",
            OrderEvent::LineRemoved { .. } => "LineRemoved",
            OrderEvent::CartCleared { .. } => "CartCleared",
            OrderEvent::CheckedOut { .. } => "CheckedOut",
            OrderEvent::OrderPaid { .. } => "OrderPaid",
            OrderEvent::OrderShipped { .. } => "OrderShipped",
            OrderEvent::OrderDelivered { .. } => "OrderDelivered",
            OrderEvent::OrderCancelled { .. } => "OrderCancelled",
        }
    }
}
