//! 优雅关闭
//!
//! 每个进程的 HTTP 服务、Kafka 消费循环和后台 worker 共享同一个 `watch` 通道，
//! 收到 Ctrl+C 或 SIGTERM 后广播 `true`，各任务在当前工作单元结束后退出。

use std::fmt::Display;
use std::future::Future;

use tokio::sync::watch;
use tracing::{error, info, warn};

/// 创建关闭通知通道，初始值为 `false`
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// 监听关闭信号
///
/// K8s 通过 SIGTERM 通知 Pod 停止；本地开发通过 Ctrl+C。
/// 信号处理器注册失败时只记录日志，对应分支永不完成。
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 Ctrl+C，开始优雅关闭..."),
        _ = terminate => info!("收到 SIGTERM，开始优雅关闭..."),
    }
}

/// 等待关闭信号并广播给所有订阅者
pub async fn broadcast_on_signal(tx: watch::Sender<bool>) {
    shutdown_signal().await;
    let _ = tx.send(true);
}

/// 等待关闭通道变为 `true`，供 `axum::serve(..).with_graceful_shutdown` 使用
pub async fn wait(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

/// 运行进程赖以存活的任务（如订单事件消费循环）
///
/// 未收到关闭信号时任务结束，无论成功与否都视为异常：广播关闭让整个进程退出，
/// 由编排系统拉起新实例。返回 `true` 表示任务异常退出。
pub async fn supervise<F, E>(name: &'static str, tx: watch::Sender<bool>, task: F) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    let result = task.await;

    if *tx.borrow() {
        if let Err(e) = result {
            warn!(task = name, error = %e, "关闭过程中任务返回错误");
        }
        return false;
    }

    match result {
        Ok(()) => error!(task = name, "任务意外结束，触发进程关闭"),
        Err(e) => error!(task = name, error = %e, "任务异常退出，触发进程关闭"),
    }
    let _ = tx.send(true);
    true
}
