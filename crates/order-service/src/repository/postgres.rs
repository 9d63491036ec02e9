//! PostgreSQL 订单存储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shop_shared::events::OrderStatus;
use sqlx::PgPool;
use tracing::instrument;
use uuid::Uuid;

use super::{OrderStore, ResendCutoffs};
use crate::error::Result;
use crate::models::{Order, StatusTransition};

const ORDER_COLUMNS: &str = r#"
    id, user_id, product_id, quantity, price, status,
    published_at, publish_attempts, created_at, updated_at
"#;

pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, user_id, product_id, quantity, price, status,
                published_at, publish_attempts, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(order.product_id)
        .bind(order.quantity)
        .bind(order.price)
        .bind(order.status)
        .bind(order.published_at)
        .bind(order.publish_attempts)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }

    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    async fn transition(&self, id: Uuid, status: OrderStatus) -> Result<Option<StatusTransition>> {
        // 行级条件更新，并发写入同一订单时只有第一个命中 PENDING 的生效
        let updated: Option<OrderStatus> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING status
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(status) = updated {
            return Ok(Some(StatusTransition {
                status,
                transitioned: true,
            }));
        }

        let current: Option<OrderStatus> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(current.map(|status| StatusTransition {
            status,
            transitioned: false,
        }))
    }

    async fn mark_published(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET published_at = NOW(), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_publish_failure(&self, id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET publish_attempts = publish_attempts + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_resend_candidates(
        &self,
        cutoffs: ResendCutoffs,
        limit: i64,
    ) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE status = 'PENDING'
              AND created_at >= $1
              AND (
                (published_at IS NULL AND created_at < $2)
                OR published_at < $3
              )
            ORDER BY created_at
            LIMIT $4
            "#
        ))
        .bind(cutoffs.created_after)
        .bind(cutoffs.unpublished_before)
        .bind(cutoffs.published_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    async fn count_stranded(&self, created_before: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders WHERE status = 'PENDING' AND created_at < $1",
        )
        .bind(created_before)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.max(0) as u64)
    }
}
