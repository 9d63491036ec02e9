//! 订单事件补发
//!
//! 周期扫描 PENDING 订单：
//! - 从未投递成功且已超过 `republish_after` 的订单重新投递；
//! - 已投递但超过 `reconcile_after` 仍无结论的订单也重新投递，
//!   商品服务命中账本后会重放状态回调，补上丢失的回调。
//!
//! 创建时间早于 `resend_horizon` 的订单不再补发：商品服务的幂等账本只保留有限时长，
//! 账本条目清理后再次投递会被当作新订单重复扣减。这类订单只计数并告警，等待人工处理。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use shop_shared::config::SagaConfig;
use tokio::sync::watch;
use shop_shared::observability::metrics;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::repository::ResendCutoffs;
use crate::service::OrderService;

/// 单轮扫描的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResendStats {
    pub scanned: usize,
    pub published: usize,
    pub failed: usize,
    /// 超出补发窗口、仍停留在 PENDING 的订单数
    pub stranded: u64,
}

pub struct ResendWorker {
    service: Arc<OrderService>,
    interval: Duration,
    batch_size: i64,
    republish_after: chrono::Duration,
    reconcile_after: chrono::Duration,
    horizon: chrono::Duration,
}

impl ResendWorker {
    pub fn new(service: Arc<OrderService>, config: &SagaConfig) -> Self {
        Self {
            service,
            interval: Duration::from_secs(config.resend_interval_secs),
            batch_size: config.resend_batch_size,
            republish_after: chrono::Duration::seconds(config.republish_after_secs as i64),
            reconcile_after: chrono::Duration::seconds(config.reconcile_after_secs as i64),
            horizon: config.resend_horizon(),
        }
    }

    /// 执行一轮扫描
    pub async fn run_once(&self) -> Result<ResendStats> {
        let now = Utc::now();
        let cutoffs = ResendCutoffs {
            created_after: now - self.horizon,
            unpublished_before: now - self.republish_after,
            published_before: now - self.reconcile_after,
        };
        let store = self.service.store();
        let candidates = store.list_resend_candidates(cutoffs, self.batch_size).await?;
        let stranded = store.count_stranded(cutoffs.created_after).await?;

        metrics::record_stranded_orders(stranded);
        if stranded > 0 {
            warn!(
                stranded,
                horizon_hours = self.horizon.num_hours(),
                "存在超出补发窗口仍未得到结论的订单，需要人工核对库存账本"
            );
        }

        let mut stats = ResendStats {
            scanned: candidates.len(),
            stranded,
            ..Default::default()
        };

        for order in &candidates {
            if self.service.republish(order).await {
                stats.published += 1;
            } else {
                stats.failed += 1;
            }
        }

        Ok(stats)
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "订单补发 worker 已启动"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，订单补发 worker 退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(stats) if stats.scanned > 0 => info!(
                            scanned = stats.scanned,
                            published = stats.published,
                            failed = stats.failed,
                            stranded = stats.stranded,
                            "补发扫描完成"
                        ),
                        Ok(_) => debug!("没有需要补发的订单"),
                        Err(e) => error!(error = %e, retryable = e.is_retryable(), "补发扫描失败"),
                    }
                }
            }
        }
    }
}
