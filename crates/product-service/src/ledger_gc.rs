//! 幂等账本清理
//!
//! 账本只需覆盖消息通道的最大重投窗口，超过保留期的条目可以安全删除。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::error::Result;
use crate::service::ProductService;

pub struct LedgerGcWorker {
    service: Arc<ProductService>,
    retention: chrono::Duration,
    interval: Duration,
}

impl LedgerGcWorker {
    pub fn new(
        service: Arc<ProductService>,
        retention: chrono::Duration,
        interval: Duration,
    ) -> Self {
        Self {
            service,
            retention,
            interval,
        }
    }

    pub async fn run_once(&self) -> Result<u64> {
        self.service.purge_expired_ledger(self.retention).await
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            retention_hours = self.retention.num_hours(),
            interval_secs = self.interval.as_secs(),
            "账本清理 worker 已启动"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("收到关闭信号，账本清理 worker 退出");
                        break;
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "账本清理失败");
                    }
                }
            }
        }
    }
}
