// src/store.rs
//
// Persisted copy of a session's tracked orders. Writes are best-effort: callers
// log failures and carry on.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::Order;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("db error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("snapshot store lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub orders: Vec<Order>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, key: &str, orders: &[Order]) -> Result<(), StoreError>;
    async fn load(&self, key: &str) -> Result<Option<StoredSnapshot>, StoreError>;
    async fn clear(&self, key: &str) -> Result<(), StoreError>;
}

/* -------------------------
   Postgres
--------------------------*/

pub struct PgSnapshotStore {
    db: PgPool,
}

impl PgSnapshotStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    orders: Json<Vec<Order>>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn save(&self, key: &str, orders: &[Order]) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO order_snapshot (session_key, orders, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (session_key)
            DO UPDATE SET orders = EXCLUDED.orders, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(Json(orders.to_vec()))
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<StoredSnapshot>, StoreError> {
        let row: Option<SnapshotRow> = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT orders, updated_at
            FROM order_snapshot
            WHERE session_key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| StoredSnapshot {
            orders: r.orders.0,
            updated_at: r.updated_at,
        }))
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM order_snapshot WHERE session_key = $1")
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}

/* -------------------------
   In-memory (no DATABASE_URL, tests)
--------------------------*/

#[derive(Default)]
pub struct MemorySnapshotStore {
    entries: Mutex<HashMap<String, StoredSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, key: &str, orders: &[Order]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(
            key.to_string(),
            StoredSnapshot {
                orders: orders.to_vec(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn load(&self, key: &str) -> Result<Option<StoredSnapshot>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn clear(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;

    fn order(id: i64) -> Order {
        Order {
            id,
            order_number: format!("N-{id}"),
            queue_number: format!("Q{id}"),
            room_number: "101".into(),
            status: OrderStatus::Paid,
            total_amount: 100_000.0,
            procedure_name: None,
        }
    }

    #[tokio::test]
    async fn memory_store_save_load_clear() {
        let store = MemorySnapshotStore::new();
        assert!(store.load("k").await.unwrap().is_none());

        store.save("k", &[order(1), order(2)]).await.unwrap();
        let snap = store.load("k").await.unwrap().unwrap();
        assert_eq!(snap.orders.len(), 2);

        store.save("k", &[order(3)]).await.unwrap();
        let snap = store.load("k").await.unwrap().unwrap();
        assert_eq!(snap.orders, vec![order(3)]);

        store.clear("k").await.unwrap();
        assert!(store.load("k").await.unwrap().is_none());
    }
}
