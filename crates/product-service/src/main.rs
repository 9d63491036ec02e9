//! 商品服务入口
//!
//! 同一进程内运行 HTTP 接口、订单事件消费者、状态回调 worker 和账本清理 worker，
//! 共享一个关闭通道。

use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, http::StatusCode, middleware, routing::get};
use product_service::{
    callback::{self, CallbackWorker},
    consumer::{OrderEventConsumer, OrderEventHandler},
    ledger_gc::LedgerGcWorker,
    notifier::HttpOrderStatusNotifier,
    repository::PgInventoryStore,
    routes::{self, AppState},
    service::ProductService,
};
use shop_shared::{
    config::AppConfig,
    database::Database,
    dlq::DlqProducer,
    kafka::KafkaProducer,
    observability::{self, middleware as obs_middleware},
    shutdown,
};
use tokio::net::TcpListener;
use tracing::{error, info};

const SERVICE_NAME: &str = "product-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let db = Database::connect(&config.database).await?;

    let store = Arc::new(PgInventoryStore::new(db.pool().clone()));
    let service = Arc::new(ProductService::new(store));

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(shutdown::broadcast_on_signal(shutdown_tx.clone()));

    // 状态回调 worker
    let (callback_tx, callback_rx) = callback::channel();
    let notifier = HttpOrderStatusNotifier::new(
        config.upstream.order_service_url.clone(),
        config.upstream.request_timeout(),
    )?;
    let callback_worker = CallbackWorker::new(Arc::new(notifier), config.saga.callback_retry_policy());
    let callback_handle = tokio::spawn(callback_worker.run(callback_rx, shutdown_rx.clone()));

    // 订单事件消费者
    let dlq = DlqProducer::new(
        KafkaProducer::new(&config.kafka)?,
        config.kafka.dead_letter_topic.clone(),
    );
    let handler = OrderEventHandler::new(service.clone(), Arc::new(dlq), callback_tx, SERVICE_NAME);
    let consumer = OrderEventConsumer::new(&config, handler)?;
    // 消费循环退出即整个进程退出，HTTP 接口不会在没有消费者的情况下继续对外服务
    let consumer_handle = tokio::spawn(shutdown::supervise(
        "order-event-consumer",
        shutdown_tx,
        consumer.run(shutdown_rx.clone()),
    ));

    // 账本清理 worker
    let gc_worker = LedgerGcWorker::new(
        service.clone(),
        config.saga.ledger_retention(),
        Duration::from_secs(config.saga.ledger_gc_interval_secs),
    );
    tokio::spawn(gc_worker.run(shutdown_rx.clone()));

    let app = Router::new()
        .merge(routes::api_routes())
        .route(
            "/ready",
            get({
                let db = db.clone();
                move || readiness_check(db.clone())
            }),
        )
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(AppState::new(service));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait(shutdown_rx))
        .await?;

    // 消费者先退出，回调队列随发送端一起关闭，worker 投递完剩余回调后退出
    let consumer_failed = consumer_handle.await.unwrap_or_else(|e| {
        error!(error = %e, "等待消费者退出失败");
        true
    });
    if let Err(e) = callback_handle.await {
        error!(error = %e, "等待回调 worker 退出失败");
    }

    db.close().await;

    if consumer_failed {
        anyhow::bail!("订单事件消费者异常退出");
    }
    info!("Server shutdown complete");
    Ok(())
}

/// 就绪探针：检查数据库连接
async fn readiness_check(db: Database) -> (StatusCode, Json<serde_json::Value>) {
    match db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready", "database": "ok" })),
        ),
        Err(e) => {
            error!(error = %e, "就绪检查失败");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "not_ready", "database": "unavailable" })),
            )
        }
    }
}
