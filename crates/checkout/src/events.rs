//! Events recorded by a checkout run.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{BuyerId, DomainEvent, ProductId};
use serde::{Deserialize, Serialize};

/// The audit trail of one checkout run. Every stock commit, release,
/// and the final outcome is an event, so a half-finished run can be
/// reconstructed and inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum CheckoutEvent {
    CheckoutStarted {
        run_id: AggregateId,
        order_id: AggregateId,
        buyer_id: BuyerId,
        started_at: DateTime<Utc>,
    },

    /// One line's stock was taken from the ledger.
    StockCommitted { product_id: ProductId, quantity: u32 },

    /// The ledger rejected a line; compensation follows.
    StockCommitFailed { product_id: ProductId, reason: String },

    CompensationStarted { reason: String },

    /// A previously committed line was returned to the ledger.
    StockReleased { product_id: ProductId, quantity: u32 },

    /// A release failed; the discrepancy needs manual correction.
    StockReleaseFailed { product_id: ProductId, reason: String },

    /// The order flipped to pending and sellers were notified.
    OrderPlaced { placed_at: DateTime<Utc> },

    CheckoutFailed { reason: String },
}

impl CheckoutEvent {
    pub fn started(run_id: AggregateId, order_id: AggregateId, buyer_id: BuyerId) -> Self {
        CheckoutEvent::CheckoutStarted {
            run_id,
            order_id,
            buyer_id,
            started_at: Utc::now(),
        }
    }

    pub fn stock_committed(product_id: ProductId, quantity: u32) -> Self {
        CheckoutEvent::StockCommitted {
            product_id,
            quantity,
        }
    }

    pub fn stock_commit_failed(product_id: ProductId, reason: impl Into<String>) -> Self {
        CheckoutEvent::StockCommitFailed {
            product_id,
            reason: reason.into(),
        }
    }

    pub fn compensation_started(reason: impl Into<String>) -> Self {
        CheckoutEvent::CompensationStarted {
            reason: reason.into(),
        }
    }

    pub fn stock_released(product_id: ProductId, quantity: u32) -> Self {
        CheckoutEvent::StockReleased {
            product_id,
            quantity,
        }
    }

    pub fn stock_release_failed(product_id: ProductId, reason: impl Into<String>) -> Self {
        CheckoutEvent::StockReleaseFailed {
            product_id,
            reason: reason.into(),
        }
    }

    pub fn order_placed() -> Self {
        CheckoutEvent::OrderPlaced {
            placed_at: Utc::now(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        CheckoutEvent::CheckoutFailed {
            reason: reason.into(),
        }
    }
}

impl DomainEvent for CheckoutEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CheckoutEvent::CheckoutStarted { .. } => "CheckoutStarted",
            CheckoutEvent::StockCommitted { .. } => "StockCommitted",
            CheckoutEvent::StockCommitFailed { .. } => "StockCommitFailed",
            CheckoutEvent::CompensationStarted { .. } => "CompensationStarted",
            CheckoutEvent::StockReleased { .. } => "StockReleased",
            CheckoutEvent::StockReleaseFailed { .. } => "StockReleaseFailed",
            CheckoutEvent::OrderPlaced { .. } => "OrderPlaced",
            CheckoutEvent::CheckoutFailed { .. } => "CheckoutFailed",
        }
    }
}
