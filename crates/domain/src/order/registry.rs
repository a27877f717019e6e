//! Maps each buyer to their single open cart.

use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use tokio::sync::Mutex;

use crate::values::BuyerId;

/// At most one open cart exists per buyer; the registry is the lookup
/// that enforces it. `open_cart` holds the lock across lookup and
/// insert, so two racing requests for the same buyer resolve to one
/// cart ID.
#[derive(Clone, Default)]
pub struct CartRegistry {
    carts: Arc<Mutex<HashMap<BuyerId, AggregateId>>>,
}

impl CartRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The buyer's open cart, or a freshly assigned ID for a cart that
    /// does not exist yet. Returns whether the ID is new.
    pub async fn open_cart(&self, buyer_id: BuyerId) -> (AggregateId, bool) {
        let mut carts = self.carts.lock().await;
        if let Some(existing) = carts.get(&buyer_id) {
            (*existing, false)
        } else {
            let id = AggregateId::new();
            carts.insert(buyer_id, id);
            (id, true)
        }
    }

    /// Re-attaches a buyer's known open cart, used when rebuilding the
    /// map from the event log. An existing entry wins.
    pub async fn restore(&self, buyer_id: BuyerId, cart_id: AggregateId) {
        self.carts.lock().await.entry(buyer_id).or_insert(cart_id);
    }

    /// The buyer's open cart, if any.
    pub async fn current_cart(&self, buyer_id: BuyerId) -> Option<AggregateId> {
        self.carts.lock().await.get(&buyer_id).copied()
    }

    /// Detaches the cart from the buyer. Called at checkout so the
    /// next cart operation opens a fresh one.
    pub async fn release(&self, buyer_id: BuyerId) {
        self.carts.lock().await.remove(&buyer_id);
    }
}
