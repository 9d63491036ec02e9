//! PostgreSQL 库存存储
//!
//! 条件扣减依赖单条 `UPDATE ... WHERE stock >= $2` 的行级原子性；
//! 账本以 `order_id` 为主键，重复处理在 `ON CONFLICT` 处收敛。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shop_shared::events::OrderEvent;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::InventoryStore;
use crate::error::{ProductError, Result};
use crate::models::{ApplyResult, DecrementOutcome, LedgerEntry, NewProduct, Product};

pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在给定连接上执行条件扣减
    ///
    /// 扣减未命中时再判断商品是否存在，用于区分库存不足与商品不存在；
    /// 该判断只影响结论分类，不参与库存写入。
    async fn decrement_in(
        conn: &mut PgConnection,
        product_id: i64,
        quantity: i64,
    ) -> Result<DecrementOutcome> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(remaining) = remaining {
            debug!(product_id, quantity, remaining, "库存扣减成功");
            return Ok(DecrementOutcome::Decremented);
        }

        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM products WHERE id = $1)")
                .bind(product_id)
                .fetch_one(&mut *conn)
                .await?;

        Ok(if exists {
            DecrementOutcome::RejectedInsufficient
        } else {
            DecrementOutcome::RejectedUnknownProduct
        })
    }

    async fn ledger_entry_in(
        conn: &mut PgConnection,
        order_id: Uuid,
    ) -> Result<Option<LedgerEntry>> {
        let entry = sqlx::query_as::<_, LedgerEntry>(
            r#"
            SELECT order_id, product_id, quantity, outcome, recorded_at
            FROM stock_ledger
            WHERE order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(entry)
    }
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        let created = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, price, stock, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            RETURNING id, name, price, stock, created_at, updated_at
            "#,
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(product.stock)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, price, stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn decrement(&self, product_id: i64, quantity: i64) -> Result<DecrementOutcome> {
        if quantity <= 0 {
            return Err(ProductError::Validation(format!(
                "扣减数量必须大于 0，实际为 {quantity}"
            )));
        }

        let mut conn = self.pool.acquire().await?;
        Self::decrement_in(&mut *conn, product_id, quantity).await
    }

    #[instrument(skip(self, event), fields(order_id = %event.order_id, product_id = event.product_id))]
    async fn apply_order_event(&self, event: &OrderEvent) -> Result<ApplyResult> {
        if event.quantity <= 0 {
            return Err(ProductError::Validation(format!(
                "扣减数量必须大于 0，实际为 {}",
                event.quantity
            )));
        }

        let mut tx = self.pool.begin().await?;

        if let Some(entry) = Self::ledger_entry_in(&mut *tx, event.order_id).await? {
            tx.rollback().await?;
            return Ok(ApplyResult::replayed(entry.outcome));
        }

        let outcome = Self::decrement_in(&mut *tx, event.product_id, event.quantity).await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO stock_ledger (order_id, product_id, quantity, outcome, recorded_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(event.order_id)
        .bind(event.product_id)
        .bind(event.quantity)
        .bind(outcome)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            // 并发的重复投递已先一步提交，撤销本事务的扣减，沿用先提交者的结论
            tx.rollback().await?;
            warn!("检测到并发重复处理，回滚本次扣减");

            let existing = self.ledger_entry(event.order_id).await?.ok_or_else(|| {
                ProductError::Internal(format!("账本冲突后未找到订单记录: {}", event.order_id))
            })?;

            return Ok(ApplyResult::replayed(existing.outcome));
        }

        tx.commit().await?;

        Ok(ApplyResult::applied(outcome))
    }

    async fn ledger_entry(&self, order_id: Uuid) -> Result<Option<LedgerEntry>> {
        let mut conn = self.pool.acquire().await?;
        Self::ledger_entry_in(&mut *conn, order_id).await
    }

    async fn purge_ledger_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM stock_ledger WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
