//! 内存库存存储
//!
//! 适用于测试和本地联调。商品表与账本放在同一把锁之下，
//! 条件扣减与账本写入在同一个临界区内完成。

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shop_shared::events::OrderEvent;
use uuid::Uuid;

use super::InventoryStore;
use crate::error::{ProductError, Result};
use crate::models::{ApplyResult, DecrementOutcome, LedgerEntry, NewProduct, Product};

#[derive(Default)]
struct Inner {
    products: BTreeMap<i64, Product>,
    ledger: HashMap<Uuid, LedgerEntry>,
    next_id: i64,
}

impl Inner {
    fn decrement(&mut self, product_id: i64, quantity: i64) -> DecrementOutcome {
        match self.products.get_mut(&product_id) {
            None => DecrementOutcome::RejectedUnknownProduct,
            Some(product) if product.stock < quantity => DecrementOutcome::RejectedInsufficient,
            Some(product) => {
                product.stock -= quantity;
                product.updated_at = Utc::now();
                DecrementOutcome::Decremented
            }
        }
    }
}

/// 内存库存存储
///
/// `set_available(false)` 模拟数据存储故障，之后的每次调用都返回可重试错误。
pub struct InMemoryInventoryStore {
    inner: Mutex<Inner>,
    available: AtomicBool,
}

impl Default for InMemoryInventoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Default::default()
            }),
            available: AtomicBool::new(true),
        }
    }

    /// 切换存储可用状态
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// 账本条目总数
    pub fn ledger_len(&self) -> usize {
        self.inner.lock().ledger.len()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ProductError::StoreUnavailable(
                "内存存储已被标记为不可用".to_string(),
            ))
        }
    }

    fn ensure_positive(quantity: i64) -> Result<()> {
        if quantity <= 0 {
            return Err(ProductError::Validation(format!(
                "扣减数量必须大于 0，实际为 {quantity}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn create_product(&self, product: &NewProduct) -> Result<Product> {
        self.ensure_available()?;

        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let now = Utc::now();
        let created = Product {
            id,
            name: product.name.clone(),
            price: product.price,
            stock: product.stock,
            created_at: now,
            updated_at: now,
        };
        inner.products.insert(id, created.clone());

        Ok(created)
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>> {
        self.ensure_available()?;
        Ok(self.inner.lock().products.get(&id).cloned())
    }

    async fn decrement(&self, product_id: i64, quantity: i64) -> Result<DecrementOutcome> {
        self.ensure_available()?;
        Self::ensure_positive(quantity)?;

        Ok(self.inner.lock().decrement(product_id, quantity))
    }

    async fn apply_order_event(&self, event: &OrderEvent) -> Result<ApplyResult> {
        self.ensure_available()?;
        Self::ensure_positive(event.quantity)?;

        let mut inner = self.inner.lock();

        if let Some(entry) = inner.ledger.get(&event.order_id) {
            return Ok(ApplyResult::replayed(entry.outcome));
        }

        let outcome = inner.decrement(event.product_id, event.quantity);
        inner.ledger.insert(
            event.order_id,
            LedgerEntry {
                order_id: event.order_id,
                product_id: event.product_id,
                quantity: event.quantity,
                outcome,
                recorded_at: Utc::now(),
            },
        );

        Ok(ApplyResult::applied(outcome))
    }

    async fn ledger_entry(&self, order_id: Uuid) -> Result<Option<LedgerEntry>> {
        self.ensure_available()?;
        Ok(self.inner.lock().ledger.get(&order_id).cloned())
    }

    async fn purge_ledger_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.ensure_available()?;

        let mut inner = self.inner.lock();
        let before = inner.ledger.len();
        inner.ledger.retain(|_, entry| entry.recorded_at >= cutoff);

        Ok((before - inner.ledger.len()) as u64)
    }
}
