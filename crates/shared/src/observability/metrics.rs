//! Prometheus 指标
//!
//! 两个服务在独立端口暴露 `/metrics`；业务代码只通过下面的 `record_*` 函数记录，
//! 未安装 recorder 时（单元测试、`metrics_enabled = false`）这些调用都是空操作。

use std::net::SocketAddr;

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

const HTTP_REQUESTS: &str = "http_requests_total";
const HTTP_DURATION: &str = "http_request_duration_seconds";
const EVENTS_PROCESSED: &str = "order_events_processed_total";
const STATUS_TRANSITIONS: &str = "order_status_transitions_total";
const EVENTS_PUBLISHED: &str = "order_events_published_total";
const EVENTS_REPUBLISHED: &str = "order_events_republished_total";
const STATUS_CALLBACKS: &str = "order_status_callbacks_total";
const LEDGER_PURGED: &str = "stock_ledger_purged_total";
const ORDERS_STRANDED: &str = "orders_stranded_pending";

/// 指标端点任务，drop 时停止监听
pub struct MetricsHandle {
    server: JoinHandle<()>,
}

impl Drop for MetricsHandle {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// 安装全局 recorder 并在 `0.0.0.0:{port}` 上启动指标端点
pub async fn init(service_name: &str, port: u16) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new()
        .add_global_label("service", service_name)
        .install_recorder()?;
    describe();

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "指标端点已启动");

    let server = tokio::spawn(serve(listener, handle));
    Ok(MetricsHandle { server })
}

async fn serve(listener: TcpListener, handle: PrometheusHandle) {
    let app = Router::new().route("/metrics", get(move || std::future::ready(handle.render())));
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "指标端点异常退出");
    }
}

fn describe() {
    metrics::describe_counter!(HTTP_REQUESTS, "HTTP requests by method, route and status");
    metrics::describe_histogram!(HTTP_DURATION, "HTTP request latency in seconds");
    metrics::describe_counter!(
        EVENTS_PROCESSED,
        "Order events consumed by the product service, by outcome"
    );
    metrics::describe_counter!(STATUS_TRANSITIONS, "Order status transitions away from PENDING");
    metrics::describe_counter!(EVENTS_PUBLISHED, "Order event publish attempts, by result");
    metrics::describe_counter!(EVENTS_REPUBLISHED, "Order events re-published by the resender");
    metrics::describe_counter!(
        STATUS_CALLBACKS,
        "Status callbacks delivered to the order service, by result"
    );
    metrics::describe_counter!(LEDGER_PURGED, "Expired ledger rows deleted");
    metrics::describe_gauge!(
        ORDERS_STRANDED,
        "PENDING orders older than the resend horizon, no longer re-published"
    );
}

fn result_label(success: bool) -> &'static str {
    if success { "ok" } else { "error" }
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    metrics::counter!(
        HTTP_REQUESTS,
        "method" => method.to_owned(),
        "path" => path.to_owned(),
        "status" => status.clone()
    )
    .increment(1);
    metrics::histogram!(
        HTTP_DURATION,
        "method" => method.to_owned(),
        "path" => path.to_owned(),
        "status" => status
    )
    .record(duration_secs);
}

/// `outcome` 取账本结论（DECREMENTED 等）、`MALFORMED` 或 `RETRY`；
/// `replayed` 表示结论来自账本中已有的记录
pub fn record_order_event_processed(outcome: &str, replayed: bool) {
    metrics::counter!(
        EVENTS_PROCESSED,
        "outcome" => outcome.to_owned(),
        "replayed" => replayed.to_string()
    )
    .increment(1);
}

/// 只在 PENDING 真正迁移到终态时调用
pub fn record_order_status_transition(status: &str) {
    metrics::counter!(STATUS_TRANSITIONS, "status" => status.to_owned()).increment(1);
}

pub fn record_order_event_published(success: bool) {
    metrics::counter!(EVENTS_PUBLISHED, "result" => result_label(success)).increment(1);
}

pub fn record_order_event_republished(reason: &str) {
    metrics::counter!(EVENTS_REPUBLISHED, "reason" => reason.to_owned()).increment(1);
}

pub fn record_status_callback(success: bool) {
    metrics::counter!(STATUS_CALLBACKS, "result" => result_label(success)).increment(1);
}

pub fn record_ledger_purged(rows: u64) {
    metrics::counter!(LEDGER_PURGED).increment(rows);
}

/// 最近一轮补发扫描看到的超窗 PENDING 订单数
pub fn record_stranded_orders(count: u64) {
    metrics::gauge!(ORDERS_STRANDED).set(count as f64);
}
