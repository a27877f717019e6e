//! The event-sourced state of one checkout run.

use common::AggregateId;
use domain::{Aggregate, BuyerId, ProductId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::error::CheckoutError;
use crate::events::CheckoutEvent;
use crate::state::CheckoutState;

/// Rehydrated view of a checkout run, rebuilt from its events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutRun {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    buyer_id: Option<BuyerId>,
    state: CheckoutState,
    /// Lines taken from the ledger, in commit order.
    committed: Vec<(ProductId, u32)>,
    /// Lines that failed to release during compensation.
    stuck: Vec<ProductId>,
    failure_reason: Option<String>,
}

impl CheckoutRun {
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn buyer_id(&self) -> Option<BuyerId> {
        self.buyer_id
    }

    pub fn state(&self) -> CheckoutState {
        self.state
    }

    /// Lines currently held by this run, in commit order.
    pub fn committed(&self) -> &[(ProductId, u32)] {
        &self.committed
    }

    /// Lines whose release failed during compensation.
    pub fn stuck(&self) -> &[ProductId] {
        &self.stuck
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }
}

impl Aggregate for CheckoutRun {
    type Event = CheckoutEvent;
    type Error = CheckoutError;

    fn aggregate_type() -> &'static str {
        "CheckoutRun"
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
            CheckoutEvent::CheckoutStarted {
                run_id,
                order_id,
                buyer_id,
                ..
            } => {
                self.id = Some(run_id);
                self.order_id = Some(order_id);
                self.buyer_id = Some(buyer_id);
                self.state = CheckoutState::Committing;
            }
            CheckoutEvent::StockCommitted {
                product_id,
                quantity,
            } => {
                self.committed.push((product_id, quantity));
            }
            CheckoutEvent::StockCommitFailed { reason, .. } => {
                self.failure_reason = Some(reason);
            }
            CheckoutEvent::CompensationStarted { reason } => {
                self.state = CheckoutState::Compensating;
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(reason);
                }
            }
            CheckoutEvent::StockReleased { product_id, .. } => {
                self.committed.retain(|(p, _)| *p != product_id);
            }
            CheckoutEvent::StockReleaseFailed { product_id, .. } => {
                self.stuck.push(product_id);
            }
            CheckoutEvent::OrderPlaced { .. } => {
                self.state = CheckoutState::Placed;
            }
            CheckoutEvent::CheckoutFailed { reason } => {
                self.state = CheckoutState::Failed;
                if self.failure_reason.is_none() {
                    self.failure_reason = Some(reason);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_of_successful_run() {
        let mut run = CheckoutRun::default();
        let run_id = AggregateId::new();
        let order_id = AggregateId::new();
        let first = ProductId::new();
        let second = ProductId::new();

        run.apply_events(vec![
            CheckoutEvent::started(run_id, order_id, BuyerId::new()),
            CheckoutEvent::stock_committed(first, 2),
            CheckoutEvent::stock_committed(second, 1),
            CheckoutEvent::order_placed(),
        ]);

        assert_eq!(run.id(), Some(run_id));
        assert_eq!(run.order_id(), Some(order_id));
        assert_eq!(run.state(), CheckoutState::Placed);
        assert_eq!(run.committed().len(), 2);
        assert!(run.failure_reason().is_none());
    }

    #[test]
    fn replay_of_compensated_run() {
        let mut run = CheckoutRun::default();
        let first = ProductId::new();
        let second = ProductId::new();

        run.apply_events(vec![
            CheckoutEvent::started(AggregateId::new(), AggregateId::new(), BuyerId::new()),
            CheckoutEvent::stock_committed(first, 2),
            CheckoutEvent::stock_commit_failed(second, "insufficient stock"),
            CheckoutEvent::compensation_started("insufficient stock"),
            CheckoutEvent::stock_released(first, 2),
            CheckoutEvent::failed("insufficient stock"),
        ]);

        assert_eq!(run.state(), CheckoutState::Failed);
        assert!(run.committed().is_empty());
        assert_eq!(run.failure_reason(), Some("insufficient stock"));
    }

    #[test]
    fn stuck_release_is_visible() {
        let mut run = CheckoutRun::default();
        let first = ProductId::new();

        run.apply_events(vec![
            CheckoutEvent::started(AggregateId::new(), AggregateId::new(), BuyerId::new()),
            CheckoutEvent::stock_committed(first, 2),
            CheckoutEvent::compensation_started("downstream failure"),
            CheckoutEvent::stock_release_failed(first, "gateway down"),
            CheckoutEvent::failed("downstream failure"),
        ]);

        assert_eq!(run.stuck(), &[first]);
    }
}
