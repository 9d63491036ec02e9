//! 跨服务同步调用的 HTTP 契约
//!
//! 商品查询（订单服务 -> 商品服务）与状态回调（商品服务 -> 订单服务）两端共用的请求 / 响应体。

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::OrderStatus;

/// `GET /products/{id}` 的响应体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: i64,
    pub name: String,
    pub stock: i64,
    pub price: i64,
}

/// `POST /orders/{id}/status` 的请求体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// `POST /orders/{id}/status` 的响应体
///
/// `transitioned = false` 表示订单已处于终态，本次回调为空操作。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateResponse {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub transitioned: bool,
}
