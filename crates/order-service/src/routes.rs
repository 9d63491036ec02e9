//! 订单服务 HTTP 接口
//!
//! - `POST /orders`：下单
//! - `GET /orders/{id}`：查询订单最终状态
//! - `POST /orders/{id}/status`：商品服务的状态回调

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use shop_shared::contracts::{StatusUpdateResponse, UpdateOrderStatusRequest};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CreateOrderRequest, CreateOrderResponse, Order};
use crate::service::OrderService;

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<OrderService>,
}

impl AppState {
    pub fn new(service: Arc<OrderService>) -> Self {
        Self { service }
    }
}

/// 构建订单服务路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/status", post(update_status))
        .route("/health", get(health_check))
}

/// POST /orders
async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>)> {
    let resp = state.service.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

/// GET /orders/{id}
async fn get_order(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    Ok(Json(state.service.get_order(id).await?))
}

/// POST /orders/{id}/status
async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<Json<StatusUpdateResponse>> {
    Ok(Json(state.service.update_status(id, req.status).await?))
}

/// 存活探针
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "order-service"
    }))
}
