//! Order lifecycle states and the transition table.

use serde::{Deserialize, Serialize};

/// Lifecycle of an order.
///
/// An order starts life as the buyer's cart and becomes a real order
/// at checkout. The allowed moves form a fixed table; anything not in
/// `allowed_next` is rejected, never partially applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Mutable cart. Lines can be added, changed, and removed.
    #[default]
    Cart,

    /// Checked out, awaiting payment. Lines and total are frozen.
    Pending,

    /// Payment recorded.
    Paid,

    /// Handed to delivery.
    Shipped,

    /// Received by the buyer. Terminal.
    Delivered,

    /// Cancelled before shipment. Terminal.
    Cancelled,
}

impl OrderStatus {
    /// Whether cart line mutations are allowed in this state.
    pub fn can_modify_lines(&self) -> bool {
        matches!(self, OrderStatus::Cart)
    }

    /// Whether checkout can run from this state.
    pub fn can_check_out(&self) -> bool {
        matches!(self, OrderStatus::Cart)
    }

    /// Whether the order has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// States reachable from this one.
    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Cart => &[OrderStatus::Pending],
            OrderStatus::Pending => &[OrderStatus::Paid, OrderStatus::Cancelled],
            OrderStatus::Paid => &[OrderStatus::Shipped, OrderStatus::Cancelled],
            OrderStatus::Shipped => &[OrderStatus::Delivered],
            OrderStatus::Delivered | OrderStatus::Cancelled => &[],
        }
    }

    /// Whether moving to `target` is in the transition table.
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_next().contains(&target)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Cart => "Cart",
            OrderStatus::Pending => "Pending",
            OrderStatus::Paid => "Paid",
            OrderStatus::Shipped => "Shipped",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
