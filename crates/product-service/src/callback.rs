//! 状态回调投递
//!
//! 消费端在账本提交后把订单终态放入有界队列，由本 worker 按重试策略投递给订单服务。
//! 投递与消息确认解耦：回调失败不会导致重新扣减，订单服务的补发对账会重新触发回调。

use std::sync::Arc;

use shop_shared::error::ShopError;
use shop_shared::events::OrderStatus;
use shop_shared::observability::metrics;
use shop_shared::retry::{RetryPolicy, retry_with_policy};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::notifier::OrderStatusNotifier;

/// 队列容量；队列满时消费端在入队处等待，形成背压
pub const CALLBACK_QUEUE_CAPACITY: usize = 1024;

/// 待投递的订单终态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusNotification {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

pub fn channel() -> (
    mpsc::Sender<StatusNotification>,
    mpsc::Receiver<StatusNotification>,
) {
    mpsc::channel(CALLBACK_QUEUE_CAPACITY)
}

pub struct CallbackWorker {
    notifier: Arc<dyn OrderStatusNotifier>,
    policy: RetryPolicy,
}

impl CallbackWorker {
    pub fn new(notifier: Arc<dyn OrderStatusNotifier>, policy: RetryPolicy) -> Self {
        Self { notifier, policy }
    }

    /// 投递单条回调，返回是否成功
    pub async fn deliver(&self, notification: StatusNotification) -> bool {
        let StatusNotification { order_id, status } = notification;

        let result = retry_with_policy(
            &self.policy,
            "order_status_callback",
            ShopError::is_retryable,
            || self.notifier.notify(order_id, status),
        )
        .await;

        match result {
            Ok(response) => {
                metrics::record_status_callback(true);
                debug!(
                    %order_id,
                    status = %response.status,
                    transitioned = response.transitioned,
                    "状态回调已送达"
                );
                true
            }
            Err(e) => {
                metrics::record_status_callback(false);
                error!(
                    %order_id,
                    %status,
                    error = %e,
                    "状态回调投递失败，等待订单服务补发对账"
                );
                false
            }
        }
    }

    /// 投递队列中当前已有的全部回调
    pub async fn drain(&self, rx: &mut mpsc::Receiver<StatusNotification>) -> usize {
        let mut delivered = 0;
        while let Ok(notification) = rx.try_recv() {
            if self.deliver(notification).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// 持续投递直到队列关闭或收到关闭信号；关闭前尽量投递已入队的回调
    pub async fn run(
        self,
        mut rx: mpsc::Receiver<StatusNotification>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("状态回调 worker 已启动");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        let delivered = self.drain(&mut rx).await;
                        info!(delivered, "收到关闭信号，状态回调 worker 退出");
                        break;
                    }
                }

                notification = rx.recv() => {
                    let Some(notification) = notification else {
                        info!("回调队列已关闭，状态回调 worker 退出");
                        break;
                    };
                    self.deliver(notification).await;
                }
            }
        }
    }
}
