use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::domain::loyalty::LoyaltyAccount;
use crate::domain::order::{Order, OrderId};
use crate::domain::UserId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("order not found: {0}")]
    NotFound(String),
}

/// Loyalty ledger contract. Whole-account read/write: `save_account` replaces
/// the stored account wholesale, and a missing account loads as the
/// zero-valued default rather than an error.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn load_account(&self, user: &UserId) -> Result<LoyaltyAccount, StoreError>;
    async fn save_account(&self, user: &UserId, account: LoyaltyAccount)
        -> Result<(), StoreError>;
}

/// Committed-order store contract. `append` is an upsert keyed by the order
/// id, which makes a retried commit idempotent. `update` rewrites an existing
/// order (status/tracking changes from the admin bridge).
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn append(&self, order: Order) -> Result<OrderId, StoreError>;
    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Order>, StoreError>;
    async fn list_all(&self) -> Result<Vec<Order>, StoreError>;
    async fn update(&self, order: Order) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryLedgerStore {
    accounts: RwLock<HashMap<String, LoyaltyAccount>>,
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn load_account(&self, user: &UserId) -> Result<LoyaltyAccount, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&user.0).cloned().unwrap_or_default())
    }

    async fn save_account(
        &self,
        user: &UserId,
        account: LoyaltyAccount,
    ) -> Result<(), StoreError> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(user.0.clone(), account);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn append(&self, order: Order) -> Result<OrderId, StoreError> {
        let id = order.id.clone();
        let mut orders = self.orders.write().await;
        orders.insert(id.0.clone(), order);
        Ok(id)
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|order| &order.user_id == user).cloned().collect())
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        Ok(orders.values().cloned().collect())
    }

    async fn update(&self, order: Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if !orders.contains_key(&order.id.0) {
            return Err(StoreError::NotFound(order.id.0.clone()));
        }
        orders.insert(order.id.0.clone(), order);
        Ok(())
    }
}
