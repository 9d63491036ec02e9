//! 内存订单存储
//!
//! 适用于测试和本地联调，所有订单放在同一把锁之下。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use shop_shared::events::OrderStatus;
use uuid::Uuid;

use super::{OrderStore, ResendCutoffs};
use crate::error::{OrderError, Result};
use crate::models::{Order, StatusTransition};

/// 内存订单存储
///
/// `set_available(false)` 模拟数据存储故障。
pub struct InMemoryOrderStore {
    orders: Mutex<HashMap<Uuid, Order>>,
    available: AtomicBool,
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 修改订单的时间戳，用于构造补发场景
    pub fn backdate(&self, id: Uuid, created_at: DateTime<Utc>, published_at: Option<DateTime<Utc>>) {
        if let Some(order) = self.orders.lock().get_mut(&id) {
            order.created_at = created_at;
            order.published_at = published_at;
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OrderError::StoreUnavailable(
                "内存存储已被标记为不可用".to_string(),
            ))
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        self.ensure_available()?;

        let mut orders = self.orders.lock();
        if orders.contains_key(&order.id) {
            return Err(OrderError::Internal(format!("订单 ID 冲突: {}", order.id)));
        }
        orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>> {
        self.ensure_available()?;
        Ok(self.orders.lock().get(&id).cloned())
    }

    async fn transition(&self, id: Uuid, status: OrderStatus) -> Result<Option<StatusTransition>> {
        self.ensure_available()?;

        let mut orders = self.orders.lock();
        let Some(order) = orders.get_mut(&id) else {
            return Ok(None);
        };

        if order.status.is_terminal() {
            return Ok(Some(StatusTransition {
                status: order.status,
                transitioned: false,
            }));
        }

        order.status = status;
        order.updated_at = Utc::now();
        Ok(Some(StatusTransition {
            status,
            transitioned: true,
        }))
    }

    async fn mark_published(&self, id: Uuid) -> Result<()> {
        self.ensure_available()?;

        if let Some(order) = self.orders.lock().get_mut(&id) {
            let now = Utc::now();
            order.published_at = Some(now);
            order.updated_at = now;
        }
        Ok(())
    }

    async fn record_publish_failure(&self, id: Uuid) -> Result<()> {
        self.ensure_available()?;

        if let Some(order) = self.orders.lock().get_mut(&id) {
            order.publish_attempts += 1;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list_resend_candidates(
        &self,
        cutoffs: ResendCutoffs,
        limit: i64,
    ) -> Result<Vec<Order>> {
        self.ensure_available()?;

        let mut candidates: Vec<Order> = self
            .orders
            .lock()
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at >= cutoffs.created_after)
            .filter(|o| match o.published_at {
                None => o.created_at < cutoffs.unpublished_before,
                Some(published_at) => published_at < cutoffs.published_before,
            })
            .cloned()
            .collect();

        candidates.sort_by_key(|o| o.created_at);
        candidates.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(candidates)
    }

    async fn count_stranded(&self, created_before: DateTime<Utc>) -> Result<u64> {
        self.ensure_available()?;

        let count = self
            .orders
            .lock()
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < created_before)
            .count();
        Ok(count as u64)
    }
}
