//! 库存存储层
//!
//! `InventoryStore` 是服务层依赖的抽象，生产环境使用 PostgreSQL 实现，
//! 测试与本地联调使用内存实现。两种实现都必须保证：
//! - 条件扣减是单个不可分割的操作，不存在先读后写的竞态；
//! - 账本写入与库存变更同生共死。

mod memory;
mod postgres;

pub use memory::InMemoryInventoryStore;
pub use postgres::PgInventoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shop_shared::events::OrderEvent;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ApplyResult, DecrementOutcome, LedgerEntry, NewProduct, Product};

/// 库存存储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// 创建商品并设置初始库存
    async fn create_product(&self, product: &NewProduct) -> Result<Product>;

    async fn find_product(&self, id: i64) -> Result<Option<Product>>;

    /// 条件扣减：仅当商品存在且库存 >= quantity 时扣减
    async fn decrement(&self, product_id: i64, quantity: i64) -> Result<DecrementOutcome>;

    /// 账本保护的条件扣减
    ///
    /// 账本已有该订单时直接返回已记录的结论（`replayed = true`），
    /// 否则执行条件扣减并在同一原子单元内写入账本。
    async fn apply_order_event(&self, event: &OrderEvent) -> Result<ApplyResult>;

    async fn ledger_entry(&self, order_id: Uuid) -> Result<Option<LedgerEntry>>;

    /// 删除早于 `cutoff` 的账本条目，返回删除行数
    async fn purge_ledger_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}
