//! 商品服务业务层
//!
//! 对外提供商品创建 / 查询，对消费端提供账本保护的库存扣减。

use std::sync::Arc;

use chrono::Utc;
use shop_shared::events::OrderEvent;
use shop_shared::observability::metrics;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ProductError, Result};
use crate::models::{ApplyResult, DecrementOutcome, LedgerEntry, NewProduct, Product};
use crate::repository::InventoryStore;

#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn InventoryStore>,
}

impl ProductService {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        product.validate()?;

        let created = self.store.create_product(&product).await?;
        info!(
            product_id = created.id,
            stock = created.stock,
            price = created.price,
            "商品已创建"
        );
        Ok(created)
    }

    pub async fn find_product(&self, id: i64) -> Result<Product> {
        self.store
            .find_product(id)
            .await?
            .ok_or(ProductError::ProductNotFound(id))
    }

    /// 处理一条订单事件
    ///
    /// 返回错误时不会有任何账本写入或库存变更；是否重试由 `is_retryable` 决定。
    #[instrument(
        skip(self, event),
        fields(order_id = %event.order_id, product_id = event.product_id, quantity = event.quantity)
    )]
    pub async fn apply_order_event(&self, event: &OrderEvent) -> Result<ApplyResult> {
        event
            .validate()
            .map_err(|e| ProductError::Validation(e.to_string()))?;

        let result = self.store.apply_order_event(event).await?;

        metrics::record_order_event_processed(result.outcome.as_str(), result.replayed);

        if result.replayed {
            info!(outcome = %result.outcome, "订单事件重复投递，沿用账本结论");
        } else {
            match result.outcome {
                DecrementOutcome::Decremented => info!(outcome = %result.outcome, "库存扣减成功"),
                _ => warn!(outcome = %result.outcome, "库存扣减被拒绝，订单将标记为失败"),
            }
        }

        Ok(result)
    }

    pub async fn ledger_entry(&self, order_id: Uuid) -> Result<LedgerEntry> {
        self.store
            .ledger_entry(order_id)
            .await?
            .ok_or(ProductError::LedgerEntryNotFound(order_id))
    }

    /// 清理超出保留期的账本条目
    pub async fn purge_expired_ledger(&self, retention: chrono::Duration) -> Result<u64> {
        let cutoff = Utc::now() - retention;
        let purged = self.store.purge_ledger_before(cutoff).await?;

        if purged > 0 {
            metrics::record_ledger_purged(purged);
            info!(purged, %cutoff, "已清理过期账本条目");
        }
        Ok(purged)
    }
}
