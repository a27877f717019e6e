//! Post-checkout order transitions driven by sellers.

use std::sync::Arc;

use common::AggregateId;
use domain::{
    Aggregate, CommandHandler, Order, OrderStatus, UserDirectory, require_seller,
};
use event_store::EventStore;
use uuid::Uuid;

use crate::error::{CheckoutError, Result};
use crate::services::stock::StockGateway;

/// Moves placed orders along their lifecycle on behalf of a seller.
///
/// Cancellation puts the committed stock back through the same gateway
/// checkout took it from.
pub struct FulfillmentService<S, G>
where
    S: EventStore + Clone,
    G: StockGateway,
{
    orders: CommandHandler<S, Order>,
    gateway: G,
    directory: Arc<dyn UserDirectory>,
}

impl<S, G> FulfillmentService<S, G>
where
    S: EventStore + Clone,
    G: StockGateway,
{
    pub fn new(store: S, gateway: G, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            orders: CommandHandler::new(store),
            gateway,
            directory,
        }
    }

    /// Applies one status transition as the given seller.
    #[tracing::instrument(skip(self, reason), fields(%user, %order_id, %target))]
    pub async fn transition(
        &self,
        user: Uuid,
        order_id: AggregateId,
        target: OrderStatus,
        reason: Option<String>,
    ) -> Result<Order> {
        let seller_id = require_seller(self.directory.as_ref(), user).await?;

        self.orders
            .load_existing(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        let result = self
            .orders
            .execute(order_id, |order| {
                order.transition_by_seller(seller_id, target, reason.clone())
            })
            .await?;

        metrics::counter!("order_transitions_total", "target" => target.as_str()).increment(1);
        tracing::info!(%order_id, %seller_id, %target, "order transitioned");

        if target == OrderStatus::Cancelled {
            self.restock(&result.aggregate).await;
        }

        Ok(result.aggregate)
    }

    /// Returns every line of a cancelled order to the ledger. Release
    /// failures are logged, not propagated: the cancellation already
    /// happened and re-running it cannot help.
    async fn restock(&self, order: &Order) {
        for line in order.lines() {
            match self.gateway.release(line.product_id, line.quantity).await {
                Ok(remaining) => {
                    tracing::debug!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        remaining,
                        "cancelled stock restored"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        product_id = %line.product_id,
                        quantity = line.quantity,
                        error = %e,
                        "failed to restore stock after cancellation"
                    );
                }
            }
        }
        metrics::counter!("order_cancellations_restocked_total").increment(1);
    }
}
