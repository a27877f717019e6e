//! User roles and the directory the services resolve them against.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::DomainError;
use crate::values::{BuyerId, SellerId};

/// What a user is allowed to do on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Buyer,
    Seller,
}

/// Looks up the role attached to a user account.
///
/// Identity itself (sessions, tokens) lives outside the domain; the
/// services only need to know which role a caller-supplied user ID
/// carries.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn role_of(&self, user: Uuid) -> Result<Option<Role>, DomainError>;
}

/// Directory backed by a map, for tests and single-node deployments.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    roles: Arc<RwLock<HashMap<Uuid, Role>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_buyer(&self) -> BuyerId {
        let buyer = BuyerId::new();
        self.roles.write().await.insert(buyer.as_uuid(), Role::Buyer);
        buyer
    }

    pub async fn register_seller(&self) -> SellerId {
        let seller = SellerId::new();
        self.roles
            .write()
            .await
            .insert(seller.as_uuid(), Role::Seller);
        seller
    }

    pub async fn insert(&self, user: Uuid, role: Role) {
        self.roles.write().await.insert(user, role);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn role_of(&self, user: Uuid) -> Result<Option<Role>, DomainError> {
        Ok(self.roles.read().await.get(&user).copied())
    }
}

/// Resolves `user` to a buyer, or rejects with `Unauthorized`.
pub async fn require_buyer(
    directory: &dyn UserDirectory,
    user: Uuid,
) -> Result<BuyerId, DomainError> {
    match directory.role_of(user).await? {
        Some(Role::Buyer) => Ok(BuyerId::from_uuid(user)),
        _ => Err(DomainError::Unauthorized(format!(
            "user {user} is not a buyer"
        ))),
    }
}

/// Resolves `user` to a seller, or rejects with `Unauthorized`.
pub async fn require_seller(
    directory: &dyn UserDirectory,
    user: Uuid,
) -> Result<SellerId, DomainError> {
    match directory.role_of(user).await? {
        Some(Role::Seller) => Ok(SellerId::from_uuid(user)),
        _ => Err(DomainError::Unauthorized(format!(
            "user {user} is not a seller"
        ))),
    }
}
