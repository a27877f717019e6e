//! Checkout coordinator: commits stock line by line, then places the
//! order, compensating on any failure.

use common::AggregateId;
use domain::{
    Aggregate, CartRegistry, CommandHandler, DomainEvent, Order, OrderEvent, ProductId,
};
use event_store::{AppendOptions, EventRecord, EventStore, Version};

use crate::aggregate::CheckoutRun;
use crate::error::{CheckoutError, Result};
use crate::events::CheckoutEvent;
use crate::services::notifier::SellerNotifier;
use crate::services::stock::StockGateway;

/// Drives one cart through checkout.
///
/// Stock is committed per line against the ledger; the first line the
/// ledger rejects aborts the run and every line committed so far is
/// released in reverse order. Only when all lines hold does the order
/// flip from cart to pending, after which sellers are notified. The
/// run itself is event-sourced so a crash mid-way leaves an auditable
/// trail instead of silently lost stock.
pub struct CheckoutCoordinator<S, G, N>
where
    S: EventStore + Clone,
    G: StockGateway,
    N: SellerNotifier,
{
    store: S,
    orders: CommandHandler<S, Order>,
    runs: CommandHandler<S, CheckoutRun>,
    registry: CartRegistry,
    gateway: G,
    notifier: N,
}

impl<S, G, N> CheckoutCoordinator<S, G, N>
where
    S: EventStore + Clone,
    G: StockGateway,
    N: SellerNotifier,
{
    pub fn new(store: S, registry: CartRegistry, gateway: G, notifier: N) -> Self {
        Self {
            orders: CommandHandler::new(store.clone()),
            runs: CommandHandler::new(store.clone()),
            store,
            registry,
            gateway,
            notifier,
        }
    }

    /// Checks out the given cart. Returns the run ID on success; on
    /// failure all committed stock has been released and the cart is
    /// untouched.
    #[tracing::instrument(skip(self), fields(%order_id))]
    pub async fn check_out(&self, order_id: AggregateId) -> Result<AggregateId> {
        metrics::counter!("checkout_runs_total").increment(1);
        let run_start = std::time::Instant::now();

        let order = self
            .orders
            .load_existing(order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))?;

        let buyer_id = order
            .buyer_id()
            .ok_or_else(|| CheckoutError::CartNotReady("cart has no buyer".to_string()))?;
        if !order.status().can_check_out() {
            return Err(CheckoutError::CartNotReady(format!(
                "order is {}, only carts check out",
                order.status()
            )));
        }
        if order.is_empty() {
            return Err(CheckoutError::Domain(
                domain::OrderError::EmptyCart.into(),
            ));
        }

        // The flip at the end expects this version, so a cart mutated
        // after this point conflicts instead of freezing lines whose
        // stock was never committed.
        let cart_version = order.version();

        // Commit in a fixed order so two runs over overlapping products
        // contend in the same sequence.
        let mut lines: Vec<(ProductId, u32)> = order
            .lines()
            .map(|l| (l.product_id, l.quantity))
            .collect();
        lines.sort_by_key(|(p, _)| p.as_uuid());

        let run_id = AggregateId::new();
        let mut run = CheckoutRun::default();
        let mut version = Version::initial();

        let started = CheckoutEvent::started(run_id, order_id, buyer_id);
        version = self.append_run_event(run_id, version, &started).await?;
        run.apply(started);

        for (product_id, quantity) in lines {
            match self.gateway.commit(product_id, quantity).await {
                Ok(remaining) => {
                    tracing::debug!(%product_id, quantity, remaining, "stock committed");
                    let event = CheckoutEvent::stock_committed(product_id, quantity);
                    version = self.append_run_event(run_id, version, &event).await?;
                    run.apply(event);
                }
                Err(e) => {
                    let event = CheckoutEvent::stock_commit_failed(product_id, e.to_string());
                    version = self.append_run_event(run_id, version, &event).await?;
                    run.apply(event);

                    self.compensate(&mut run, run_id, &mut version).await?;
                    metrics::counter!("checkout_failed_total").increment(1);
                    metrics::histogram!("checkout_duration_seconds")
                        .record(run_start.elapsed().as_secs_f64());
                    return Err(CheckoutError::StockCommit {
                        product_id,
                        source: e,
                    });
                }
            }
        }

        // All stock held; flip the cart into a pending order.
        let flip = match order.check_out() {
            Ok(events) => events,
            Err(e) => {
                self.compensate(&mut run, run_id, &mut version).await?;
                metrics::counter!("checkout_failed_total").increment(1);
                return Err(CheckoutError::Domain(e.into()));
            }
        };
        if let Err(e) = self
            .append_order_events(order_id, cart_version, &flip)
            .await
        {
            self.compensate(&mut run, run_id, &mut version).await?;
            metrics::counter!("checkout_failed_total").increment(1);
            return Err(match e {
                CheckoutError::EventStore(
                    event_store::EventStoreError::ConcurrencyConflict { .. },
                ) => CheckoutError::CartNotReady(
                    "cart changed during checkout, retry".to_string(),
                ),
                other => other,
            });
        }
        self.registry.release(buyer_id).await;

        for seller_id in order.sellers() {
            self.notifier.order_placed(order_id, seller_id).await;
        }

        let placed = CheckoutEvent::order_placed();
        self.append_run_event(run_id, version, &placed).await?;

        let duration = run_start.elapsed().as_secs_f64();
        metrics::histogram!("checkout_duration_seconds").record(duration);
        metrics::counter!("checkout_placed_total").increment(1);
        tracing::info!(%run_id, %order_id, duration, "checkout placed");

        Ok(run_id)
    }

    /// Loads a checkout run by ID.
    pub async fn get_run(&self, run_id: AggregateId) -> Result<Option<CheckoutRun>> {
        Ok(self.runs.load_existing(run_id).await?)
    }

    /// Releases committed lines in reverse commit order.
    #[tracing::instrument(skip(self, run))]
    async fn compensate(
        &self,
        run: &mut CheckoutRun,
        run_id: AggregateId,
        version: &mut Version,
    ) -> Result<()> {
        let reason = run.failure_reason().unwrap_or("unknown").to_string();

        let started = CheckoutEvent::compensation_started(&reason);
        *version = self.append_run_event(run_id, *version, &started).await?;
        run.apply(started);

        let committed: Vec<(ProductId, u32)> = run.committed().to_vec();
        for (product_id, quantity) in committed.into_iter().rev() {
            match self.gateway.release(product_id, quantity).await {
                Ok(_) => {
                    let event = CheckoutEvent::stock_released(product_id, quantity);
                    *version = self.append_run_event(run_id, *version, &event).await?;
                    run.apply(event);
                }
                Err(e) => {
                    // Recorded for manual correction; compensation
                    // continues with the remaining lines.
                    tracing::error!(%product_id, quantity, error = %e, "stock release failed");
                    let event = CheckoutEvent::stock_release_failed(product_id, e.to_string());
                    *version = self.append_run_event(run_id, *version, &event).await?;
                    run.apply(event);
                }
            }
        }

        let failed = CheckoutEvent::failed(&reason);
        *version = self.append_run_event(run_id, *version, &failed).await?;
        run.apply(failed);

        tracing::warn!(%run_id, reason = %reason, "checkout compensated");
        Ok(())
    }

    /// Appends the checkout flip against the version the lines were
    /// read at.
    async fn append_order_events(
        &self,
        order_id: AggregateId,
        current_version: Version,
        events: &[OrderEvent],
    ) -> Result<Version> {
        let mut records = Vec::with_capacity(events.len());
        let mut version = current_version;
        for event in events {
            version = version.next();
            let record = EventRecord::builder()
                .aggregate_id(order_id)
                .aggregate_type(Order::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build();
            records.push(record);
        }

        Ok(self
            .store
            .append(records, AppendOptions::expect_version(current_version))
            .await?)
    }

    async fn append_run_event(
        &self,
        run_id: AggregateId,
        current_version: Version,
        event: &CheckoutEvent,
    ) -> Result<Version> {
        let record = EventRecord::builder()
            .aggregate_id(run_id)
            .aggregate_type(CheckoutRun::aggregate_type())
            .event_type(event.event_type())
            .version(current_version.next())
            .payload(event)?
            .build();

        Ok(self
            .store
            .append(vec![record], AppendOptions::expect_version(current_version))
            .await?)
    }
}
