//! 订单服务入口

use std::sync::Arc;

use axum::{Json, Router, http::StatusCode, middleware, routing::get};
use order_service::{
    product_client::HttpProductCatalog,
    publisher::KafkaOrderEventPublisher,
    repository::PgOrderStore,
    resender::ResendWorker,
    routes::{self, AppState},
    service::OrderService,
};
use shop_shared::{
    config::AppConfig,
    database::Database,
    kafka::KafkaProducer,
    observability::{self, middleware as obs_middleware},
    shutdown,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

const SERVICE_NAME: &str = "order-service";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load(SERVICE_NAME)?;
    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let db = Database::connect(&config.database).await?;

    let store = Arc::new(PgOrderStore::new(db.pool().clone()));
    let catalog = Arc::new(HttpProductCatalog::new(
        config.upstream.product_service_url.clone(),
        config.upstream.request_timeout(),
    )?);
    let publisher = Arc::new(KafkaOrderEventPublisher::new(
        KafkaProducer::new(&config.kafka)?,
        config.kafka.order_events_topic.clone(),
    ));
    let service = Arc::new(OrderService::new(store, catalog, publisher));

    let (shutdown_tx, shutdown_rx) = shutdown::channel();
    tokio::spawn(shutdown::broadcast_on_signal(shutdown_tx));

    // 补发 worker
    let resender = ResendWorker::new(service.clone(), &config.saga);
    let resender_handle = tokio::spawn(resender.run(shutdown_rx.clone()));

    // 下单接口面向前端，放开跨域
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::api_routes())
        .route(
            "/ready",
            get({
                let db = db.clone();
                move || readiness_check(db.clone())
            }),
        )
        .layer(cors)
        .layer(middleware::from_fn(obs_middleware::http_tracing))
        .layer(middleware::from_fn(obs_middleware::request_id))
        .with_state(AppState::new(service));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait(shutdown_rx))
        .await?;

    if let Err(e) = resender_handle.await {
        error!(error = %e, "等待补发 worker 退出失败");
    }

    db.close().await;
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
