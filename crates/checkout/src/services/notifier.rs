//! Seller notification hook.

use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::SellerId;
use tokio::sync::Mutex;

/// Called once per seller when an order containing their products is
/// placed. Delivery (email, SMS) lives behind this trait; checkout
/// only guarantees the call happens after the order flip.
#[async_trait]
pub trait SellerNotifier: Send + Sync {
    async fn order_placed(&self, order_id: AggregateId, seller_id: SellerId);
}

/// Notifier that only logs. The default in deployments without a
/// delivery channel configured.
#[derive(Clone, Default)]
pub struct NoopSellerNotifier;

impl NoopSellerNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SellerNotifier for NoopSellerNotifier {
    async fn order_placed(&self, order_id: AggregateId, seller_id: SellerId) {
        tracing::info!(%order_id, %seller_id, "order placed, seller notified");
    }
}

/// Records notifications for assertions in tests.
#[derive(Clone, Default)]
pub struct RecordingSellerNotifier {
    notifications: Arc<Mutex<Vec<(AggregateId, SellerId)>>>,
}

impl RecordingSellerNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn notifications(&self) -> Vec<(AggregateId, SellerId)> {
        self.notifications.lock().await.clone()
    }
}

#[async_trait]
impl SellerNotifier for RecordingSellerNotifier {
    async fn order_placed(&self, order_id: AggregateId, seller_id: SellerId) {
        self.notifications.lock().await.push((order_id, seller_id));
    }
}
