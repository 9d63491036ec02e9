//! 日志、追踪与指标的统一入口
//!
//! 服务启动时调用一次 [`init`]，返回的 guard 需要存活到进程退出。

pub mod metrics;
pub mod middleware;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

use crate::config::ObservabilityConfig;

/// drop 时停止指标端点并刷新未导出的 span
pub struct ObservabilityGuard {
    _metrics: Option<metrics::MetricsHandle>,
    _tracing: tracing::TracingGuard,
}

pub async fn init(service_name: &str, config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    let tracing = tracing::init(service_name, config)?;

    let metrics = if config.metrics_enabled {
        Some(metrics::init(service_name, config.metrics_port).await?)
    } else {
        None
    };

    info!(
        service = %service_name,
        log_format = %config.log_format,
        metrics_port = ?config.metrics_enabled.then_some(config.metrics_port),
        otlp_endpoint = ?config.tracing_endpoint,
        "可观测性已初始化"
    );

    Ok(ObservabilityGuard {
        _metrics: metrics,
        _tracing: tracing,
    })
}
