use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::Row;

use kiosk_core::domain::loyalty::LoyaltyAccount;
use kiosk_core::domain::order::{Order, OrderId};
use kiosk_core::domain::UserId;
use kiosk_core::stores::{LedgerStore, OrderStore, StoreError};

use crate::DbPool;

/// SQLite-backed ledger store. One row per account, replaced wholesale on
/// save: the whole-document contract, not a partial-update API.
pub struct SqliteLedgerStore {
    pool: DbPool,
}

impl SqliteLedgerStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn unavailable(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

#[async_trait]
impl LedgerStore for SqliteLedgerStore {
    async fn load_account(&self, user: &UserId) -> Result<LoyaltyAccount, StoreError> {
        let row = sqlx::query(
            "SELECT points, total_spent, orders_count FROM accounts WHERE user_id = ?",
        )
        .bind(&user.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        let Some(row) = row else {
            return Ok(LoyaltyAccount::default());
        };

        let total_spent: String = row.get("total_spent");
        let total_spent = total_spent
            .parse::<Decimal>()
            .map_err(|error| StoreError::Decode(format!("total_spent: {error}")))?;
        let orders = u32::try_from(row.get::<i64, _>("orders_count"))
            .map_err(|error| StoreError::Decode(format!("orders_count: {error}")))?;

        Ok(LoyaltyAccount { points: row.get("points"), total_spent, orders })
    }

    async fn save_account(
        &self,
        user: &UserId,
        account: LoyaltyAccount,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO accounts (user_id, points, total_spent, orders_count) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&user.0)
        .bind(account.points)
        .bind(account.total_spent.to_string())
        .bind(i64::from(account.orders))
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(())
    }
}

/// SQLite-backed order store. The full order travels as a JSON payload;
/// user id and timestamp are mirrored into indexed columns for the list
/// queries. `INSERT OR REPLACE` keyed by the order id makes `append`
/// idempotent for commit retries.
pub struct SqliteOrderStore {
    pool: DbPool,
}

impl SqliteOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn decode_order(payload: &str) -> Result<Order, StoreError> {
    serde_json::from_str(payload).map_err(|error| StoreError::Decode(error.to_string()))
}

#[async_trait]
impl OrderStore for SqliteOrderStore {
    async fn append(&self, order: Order) -> Result<OrderId, StoreError> {
        let id = order.id.clone();
        let payload = serde_json::to_string(&order)
            .map_err(|error| StoreError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT OR REPLACE INTO orders (order_id, user_id, created_at, payload) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&id.0)
        .bind(&order.user_id.0)
        .bind(order.created_at.to_rfc3339())
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(id)
    }

    async fn list_for_user(&self, user: &UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT payload FROM orders WHERE user_id = ?")
            .bind(&user.0)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter().map(|row| decode_order(row.get("payload"))).collect()
    }

    async fn list_all(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query("SELECT payload FROM orders")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter().map(|row| decode_order(row.get("payload"))).collect()
    }

    async fn update(&self, order: Order) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&order)
            .map_err(|error| StoreError::Decode(error.to_string()))?;

        let result = sqlx::query(
            "UPDATE orders SET user_id = ?, created_at = ?, payload = ? WHERE order_id = ?",
        )
        .bind(&order.user_id.0)
        .bind(order.created_at.to_rfc3339())
        .bind(payload)
        .bind(&order.id.0)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(order.id.0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use kiosk_core::catalog::ProductId;
    use kiosk_core::delivery::DeliveryMethod;
    use kiosk_core::domain::loyalty::LoyaltyAccount;
    use kiosk_core::domain::order::{Cart, Order, OrderId, OrderStatus, Redemption};
    use kiosk_core::domain::UserId;
    use kiosk_core::stores::{LedgerStore, OrderStore, StoreError};

    use crate::{connect_with_settings, migrations};

    use super::{SqliteLedgerStore, SqliteOrderStore};

    async fn pool() -> crate::DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        pool
    }

    fn order(id: &str, user: &str) -> Order {
        Order {
            id: OrderId(id.to_string()),
            user_id: UserId(user.to_string()),
            buyer_name: Some("Ivan".to_string()),
            cart: Cart {
                product_id: ProductId("airpods_2".to_string()),
                product_name: "AirPods 2".to_string(),
                quantity: 1,
                base_total: Decimal::from(35),
            },
            redemption: Redemption::default(),
            final_price: Decimal::from(35),
            delivery: DeliveryMethod::EuroPost,
            comment: None,
            recipient: "Full name: Ivan Ivanov\nPhone: +375291234567".to_string(),
            status: OrderStatus::Pending,
            tracking_code: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_account_loads_as_zero_default() {
        let store = SqliteLedgerStore::new(pool().await);

        let account = store.load_account(&UserId("nobody".to_string())).await.expect("load");

        assert_eq!(account, LoyaltyAccount::default());
    }

    #[tokio::test]
    async fn account_round_trip_preserves_decimal_spend() {
        let store = SqliteLedgerStore::new(pool().await);
        let user = UserId("u-1".to_string());
        let account = LoyaltyAccount {
            points: 650,
            total_spent: Decimal::new(1305, 1), // 130.5
            orders: 3,
        };

        store.save_account(&user, account.clone()).await.expect("save");
        let loaded = store.load_account(&user).await.expect("load");

        assert_eq!(loaded, account);
    }

    #[tokio::test]
    async fn save_replaces_the_account_wholesale() {
        let store = SqliteLedgerStore::new(pool().await);
        let user = UserId("u-1".to_string());

        store
            .save_account(&user, LoyaltyAccount { points: 100, ..LoyaltyAccount::default() })
            .await
            .expect("first save");
        store
            .save_account(&user, LoyaltyAccount { points: 40, ..LoyaltyAccount::default() })
            .await
            .expect("second save");

        assert_eq!(store.load_account(&user).await.expect("load").points, 40);
    }

    #[tokio::test]
    async fn order_append_round_trips_through_the_payload() {
        let store = SqliteOrderStore::new(pool().await);
        let original = order("ord-1", "u-1");

        store.append(original.clone()).await.expect("append");
        let listed = store.list_for_user(&UserId("u-1".to_string())).await.expect("list");

        assert_eq!(listed, vec![original]);
    }

    #[tokio::test]
    async fn append_is_idempotent_by_order_id() {
        let store = SqliteOrderStore::new(pool().await);

        store.append(order("ord-1", "u-1")).await.expect("first");
        store.append(order("ord-1", "u-1")).await.expect("retry");

        assert_eq!(store.list_all().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn update_attaches_tracking_to_an_existing_order() {
        let store = SqliteOrderStore::new(pool().await);
        store.append(order("ord-1", "u-1")).await.expect("append");

        let mut shipped = order("ord-1", "u-1");
        shipped.ship("BY123456789");
        store.update(shipped).await.expect("update");

        let listed = store.list_for_user(&UserId("u-1".to_string())).await.expect("list");
        assert_eq!(listed[0].status, OrderStatus::Shipped);
        assert_eq!(listed[0].tracking_code.as_deref(), Some("BY123456789"));
    }

    #[tokio::test]
    async fn update_of_an_unknown_order_is_rejected() {
        let store = SqliteOrderStore::new(pool().await);

        let result = store.update(order("ghost", "u-1")).await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
