//! 订单存储层
//!
//! 状态写入是条件更新：只有处于 PENDING 的订单会被改写，
//! 并发的 CONFIRMED / FAILED 写入中只有一个能生效。

mod memory;
mod postgres;

pub use memory::InMemoryOrderStore;
pub use postgres::PgOrderStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shop_shared::events::OrderStatus;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Order, StatusTransition};

/// 补发扫描的时间边界
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResendCutoffs {
    /// 早于该时刻创建的订单不再补发
    pub created_after: DateTime<Utc>,
    /// 从未投递成功且创建早于该时刻
    pub unpublished_before: DateTime<Utc>,
    /// 最近一次投递早于该时刻
    pub published_before: DateTime<Utc>,
}

/// 订单存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> Result<()>;

    async fn get(&self, id: Uuid) -> Result<Option<Order>>;

    /// 将 PENDING 订单迁移到终态
    ///
    /// 订单不存在时返回 `None`；订单已是终态时不做任何修改，返回 `transitioned = false`。
    async fn transition(&self, id: Uuid, status: OrderStatus) -> Result<Option<StatusTransition>>;

    /// 记录事件投递成功
    async fn mark_published(&self, id: Uuid) -> Result<()>;

    /// 记录一次投递失败
    async fn record_publish_failure(&self, id: Uuid) -> Result<()>;

    /// 需要补发的 PENDING 订单，按创建时间升序
    ///
    /// 只考虑创建晚于 `created_after` 的订单，其中从未投递成功且创建早于 `unpublished_before`、
    /// 或最近一次投递早于 `published_before` 的订单入选。
    async fn list_resend_candidates(
        &self,
        cutoffs: ResendCutoffs,
        limit: i64,
    ) -> Result<Vec<Order>>;

    /// 创建早于 `created_before` 仍停留在 PENDING 的订单数
    async fn count_stranded(&self, created_before: DateTime<Utc>) -> Result<u64>;
}
